/// End-to-end panel sessions against the in-memory store and a recording media host
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use study_panel::{
    access::{AccessState, OpenTarget, PageDirection, Viewport},
    auth::AdminGate,
    compose::ToolbarAction,
    media::{HostedAsset, MediaFolder, MediaHost, UploadFile, UploadPipeline},
    models::{Collection, DocumentDraft, ExamForm, ImageSetForm, LinkForm},
    panel::Panel,
    service::PanelService,
    store::{ContentStore, MemoryContentStore},
    sync::RetryPolicy,
    PanelError, PanelResult,
};

const SECRET: &str = "an-adequately-long-test-secret-0123456789";

#[derive(Default)]
struct RecordingHost {
    fail_on: Option<usize>,
    uploads: Mutex<Vec<String>>,
    discarded: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaHost for RecordingHost {
    async fn upload(&self, file: &UploadFile, folder: MediaFolder) -> PanelResult<HostedAsset> {
        let mut uploads = self.uploads.lock().unwrap();
        if self.fail_on == Some(uploads.len()) {
            return Err(PanelError::Upload("Upload preset must be whitelisted".to_string()));
        }
        let url = format!("https://cdn.test/{}/{}", folder.as_str(), file.file_name);
        uploads.push(url.clone());
        Ok(HostedAsset {
            url: url.clone(),
            discard_token: Some(url),
        })
    }

    async fn discard(&self, asset: &HostedAsset) -> PanelResult<()> {
        self.discarded.lock().unwrap().push(asset.url.clone());
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryContentStore>,
    host: Arc<RecordingHost>,
    panel: Panel,
}

async fn harness(host: RecordingHost) -> Harness {
    let store = Arc::new(MemoryContentStore::new());
    let host = Arc::new(host);
    let service = PanelService::new(store.clone(), UploadPipeline::new(host.clone(), 1024 * 1024));
    let gate = Arc::new(AdminGate::new("letmein", SECRET, 3600, 600));
    let panel = Panel::mount(
        service,
        gate,
        RetryPolicy {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_attempts: None,
        },
    );

    for collection in Collection::ALL {
        panel.sync().wait_for_version(collection, 0).await.unwrap();
    }

    Harness { store, host, panel }
}

async fn admin_harness(host: RecordingHost) -> Harness {
    let mut h = harness(host).await;
    h.panel.login_input = "letmein".to_string();
    h.panel.login().unwrap();
    h
}

/// Poll until `check` holds, failing after two seconds
async fn eventually(panel: &Panel, check: impl Fn(&Panel) -> bool) {
    for _ in 0..400 {
        if check(panel) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

fn png(name: &str, byte: u8) -> UploadFile {
    UploadFile::new(name, Some("image/png"), vec![byte; 4])
}

#[tokio::test]
async fn test_guide_link_unlock() {
    let mut h = admin_harness(RecordingHost::default()).await;

    let draft = DocumentDraft::ExternalLink(LinkForm {
        name: "Guide".into(),
        url: "https://example.com/x".into(),
        password: "p1".into(),
        note: String::new(),
    });
    let id = h.panel.create_document(&draft).await.unwrap();
    eventually(&h.panel, |p| !p.documents().is_empty()).await;

    let docs = h.panel.documents();
    assert_eq!(docs[0].name, "Guide");
    assert_eq!(docs[0].id, id);

    h.panel.select_document(&id);
    assert!(matches!(
        h.panel.unlock("wrong"),
        Err(PanelError::AccessDenied(_))
    ));
    assert_eq!(h.panel.viewer().selected(), Some(id.as_str()));
    assert!(matches!(
        h.panel.viewer().state(),
        AccessState::Locked { password_input, error: Some(_) } if password_input == "wrong"
    ));

    h.panel.unlock("p1").unwrap();
    assert_eq!(
        h.panel.open_selected().unwrap(),
        OpenTarget::Url("https://example.com/x".into())
    );

    // A later wrong password locks the document again
    assert!(matches!(
        h.panel.unlock("wrong"),
        Err(PanelError::AccessDenied(_))
    ));
    assert!(!h.panel.viewer().is_unlocked());
    assert!(h.panel.open_selected().is_err());
}

#[tokio::test]
async fn test_newest_document_listed_first() {
    let h = admin_harness(RecordingHost::default()).await;

    for name in ["Older", "Newer"] {
        let draft = DocumentDraft::ExternalLink(LinkForm {
            name: name.into(),
            url: "https://example.com".into(),
            password: "pw".into(),
            note: String::new(),
        });
        h.panel.create_document(&draft).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    eventually(&h.panel, |p| p.documents().len() == 2).await;
    let names: Vec<_> = h.panel.documents().iter().map(|d| d.name.clone()).collect();
    assert_eq!(names, vec!["Newer", "Older"]);
}

#[tokio::test]
async fn test_admin_operations_require_login() {
    let mut h = harness(RecordingHost::default()).await;

    let draft = DocumentDraft::ExternalLink(LinkForm {
        name: "Guide".into(),
        url: "https://example.com/x".into(),
        password: "p1".into(),
        note: String::new(),
    });
    assert!(matches!(
        h.panel.create_document(&draft).await,
        Err(PanelError::Authentication(_))
    ));

    h.panel.login_input = "nope".to_string();
    assert!(h.panel.login().is_err());
    assert_eq!(h.panel.login_error(), Some("Wrong admin password"));
    assert_eq!(h.panel.login_input, "nope");
    assert!(!h.panel.is_admin());
}

#[tokio::test]
async fn test_exams_group_by_semester() {
    let mut h = admin_harness(RecordingHost::default()).await;

    for subject in ["M1", "M2"] {
        let form = ExamForm {
            semester: "S1".into(),
            subject: subject.into(),
            exam_name: format!("{} final", subject),
            answers: "1A 2B".into(),
            images: vec![png(&format!("{}.png", subject), 1)],
        };
        h.panel.create_exam(&form).await.unwrap();
    }

    eventually(&h.panel, |p| p.exams().len() == 2).await;
    let groups = h.panel.exam_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups["S1"]["M1"].len(), 1);
    assert_eq!(groups["S1"]["M2"].len(), 1);
    assert_eq!(
        groups["S1"]["M1"][0].image_urls,
        vec!["https://cdn.test/examImages/M1.png"]
    );

    let first = groups["S1"]["M1"][0].id.clone();
    let second = groups["S1"]["M2"][0].id.clone();
    h.panel.toggle_exam(&first);
    h.panel.toggle_exam(&second);
    assert_eq!(h.panel.open_exam(), Some(second.as_str()));

    h.panel.delete_exam(&second).await.unwrap();
    assert_eq!(h.panel.open_exam(), None);
}

#[tokio::test]
async fn test_bold_toolbar_and_blog_filtering() {
    let mut h = admin_harness(RecordingHost::default()).await;

    h.panel.apply_toolbar(ToolbarAction::Bold);
    assert_eq!(h.panel.blog_draft.composer.buffer(), "**bold text**");
    assert_eq!(h.panel.blog_draft.composer.selected_text(), "bold text");

    h.panel.insert_blog_image(&png("chart.png", 2)).await.unwrap();
    h.panel.blog_draft.title = "Study tips".into();
    h.panel.blog_draft.tags_input = "exam, tips, exam".into();
    assert!(h.panel.can_submit_blog());
    h.panel.create_blog().await.unwrap();
    assert_eq!(h.panel.blog_draft.composer.buffer(), "");

    eventually(&h.panel, |p| p.sync().blogs().len() == 1).await;
    let visible = h.panel.visible_blogs();
    let post = &visible[0];
    assert_eq!(
        post.content,
        "**bold text**\n![](https://cdn.test/blogImages/chart.png)"
    );
    assert_eq!(post.tags, vec!["exam", "tips"]);
    assert_eq!(h.panel.tags(), vec!["exam", "tips"]);

    h.panel.set_blog_search("STUDY");
    assert_eq!(h.panel.visible_blogs().len(), 1);
    h.panel.select_tag("other");
    assert!(h.panel.visible_blogs().is_empty());
    h.panel.select_tag("other");
    assert_eq!(h.panel.visible_blogs().len(), 1);

    h.panel.select_tag("other");
    h.panel.clear_tag();
    assert_eq!(h.panel.blog_browser().active_tag(), None);
    assert_eq!(h.panel.visible_blogs().len(), 1);
}

#[tokio::test]
async fn test_record_deleted_elsewhere_clears_selection() {
    let mut h = admin_harness(RecordingHost::default()).await;
    let draft = DocumentDraft::ExternalLink(LinkForm {
        name: "Guide".into(),
        url: "https://example.com/x".into(),
        password: "p1".into(),
        note: String::new(),
    });
    let id = h.panel.create_document(&draft).await.unwrap();
    eventually(&h.panel, |p| p.documents().len() == 1).await;

    h.panel.select_document(&id);
    h.panel.unlock("p1").unwrap();

    // Another session removes the document straight from the store
    h.store.delete(Collection::Documents, &id).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while h.panel.viewer().selected().is_some() {
            h.panel.next_change().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert!(h.panel.documents().is_empty());
    assert!(!h.panel.viewer().is_unlocked());
}

#[tokio::test]
async fn test_store_failure_rolls_back_image_set() {
    let h = admin_harness(RecordingHost::default()).await;
    h.store.set_fail_writes(true);

    let mut form = ImageSetForm {
        password: "pw".into(),
        ..Default::default()
    };
    form.pick(vec![
        png("page1.png", 1),
        UploadFile::new("notes.txt", Some("text/plain"), b"skip".to_vec()),
        png("page2.png", 2),
    ])
    .unwrap();
    assert_eq!(form.files.len(), 2);

    let err = h
        .panel
        .create_document(&DocumentDraft::ImageSet(form))
        .await
        .unwrap_err();
    assert!(matches!(err, PanelError::Store(_)));
    assert_eq!(h.host.uploaded().len(), 2);
    assert_eq!(h.host.discarded(), h.host.uploaded());
}

#[tokio::test]
async fn test_upload_failure_discards_prefix() {
    let h = admin_harness(RecordingHost {
        fail_on: Some(1),
        ..Default::default()
    })
    .await;

    let form = ImageSetForm {
        name: "Scans".into(),
        files: vec![png("a.png", 1), png("b.png", 2), png("c.png", 3)],
        password: "pw".into(),
        note: String::new(),
    };
    let err = h
        .panel
        .create_document(&DocumentDraft::ImageSet(form))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Upload failed: Upload preset must be whitelisted");
    assert_eq!(h.host.discarded(), vec!["https://cdn.test/imageDocs/a.png"]);
    assert!(h.panel.documents().is_empty());
}

#[tokio::test]
async fn test_stale_collection_keeps_snapshot_and_recovers() {
    let h = admin_harness(RecordingHost::default()).await;
    let draft = DocumentDraft::ExternalLink(LinkForm {
        name: "Guide".into(),
        url: "https://example.com/x".into(),
        password: "p1".into(),
        note: String::new(),
    });
    h.panel.create_document(&draft).await.unwrap();
    eventually(&h.panel, |p| p.documents().len() == 1).await;

    h.store.interrupt(Collection::Documents, "network unreachable");
    eventually(&h.panel, |p| p.status(Collection::Documents).is_stale()).await;
    assert_eq!(h.panel.documents().len(), 1);
    assert!(!h.panel.status(Collection::Blogs).is_stale());

    h.store.resume(Collection::Documents).unwrap();
    eventually(&h.panel, |p| !p.status(Collection::Documents).is_stale()).await;
    assert_eq!(h.panel.documents().len(), 1);
}

#[tokio::test]
async fn test_image_set_viewing_and_delete() {
    let mut h = admin_harness(RecordingHost::default()).await;
    let form = ImageSetForm {
        name: String::new(),
        files: vec![png("p1.png", 1), png("p2.png", 2)],
        password: "pw".into(),
        note: "https://notes.example".into(),
    };
    let id = h
        .panel
        .create_document(&DocumentDraft::ImageSet(form))
        .await
        .unwrap();
    eventually(&h.panel, |p| p.documents().len() == 1).await;

    let doc = h.panel.documents()[0].clone();
    assert_eq!(doc.name, "p1.png");
    assert!(doc.note_is_url());

    h.panel.select_document(&id);
    h.panel.unlock("pw").unwrap();
    assert_eq!(
        h.panel.open_selected().unwrap(),
        OpenTarget::Url("https://cdn.test/imageDocs/p1.png".into())
    );

    h.panel.set_viewport(Viewport { width: 400.0 });
    h.panel.zoom_in();
    assert!(h.panel.page_images(PageDirection::Next, 1000.0).is_none());
    assert_eq!(h.panel.viewer().strip().offset(), -120.0);

    h.panel.start_document_edit(&id).unwrap();
    h.panel.delete_document(&id).await.unwrap();
    assert_eq!(h.panel.viewer().selected(), None);
    assert!(h.panel.document_edit_mut().is_none());
    eventually(&h.panel, |p| p.documents().is_empty()).await;
}

#[tokio::test]
async fn test_edit_document_password() {
    let mut h = admin_harness(RecordingHost::default()).await;
    let draft = DocumentDraft::ExternalLink(LinkForm {
        name: "Guide".into(),
        url: "https://example.com/x".into(),
        password: "p1".into(),
        note: "first".into(),
    });
    let id = h.panel.create_document(&draft).await.unwrap();
    eventually(&h.panel, |p| p.documents().len() == 1).await;

    h.panel.start_document_edit(&id).unwrap();
    {
        let edit = h.panel.document_edit_mut().unwrap();
        edit.password = "p2".into();
        edit.note = String::new();
    }
    h.panel.save_document_edit().await.unwrap();
    eventually(&h.panel, |p| p.documents()[0].password == "p2").await;

    let doc = h.panel.documents()[0].clone();
    assert_eq!(doc.name, "Guide");
    assert_eq!(doc.note, None);

    h.panel.select_document(&id);
    assert!(h.panel.unlock("p1").is_err());
    h.panel.unlock("p2").unwrap();
}

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use folio_core::actions::{ActionExtractor, ActionTag};
use folio_core::domain::chat::{ChatReply, ChatRequest};
use folio_core::domain::document::DocumentKind;
use folio_core::errors::ChatError;
use folio_core::history;
use folio_core::prompt::PromptAssembler;

use crate::contact::{ContactSink, SAVE_FAILED_NOTICE};
use crate::documents::DocumentCache;
use crate::llm::{GenerationClient, GenerationRequest};
use crate::safety::{Classified, ErrorClassifier, SafetySettings};

pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;

/// Answers one chat request end to end. Holds no per-conversation state; the
/// document cache is the only thing shared between requests.
pub struct ChatRuntime {
    documents: Arc<DocumentCache>,
    prompt: PromptAssembler,
    generation: Arc<dyn GenerationClient>,
    contact: ContactSink,
    extractor: ActionExtractor,
    classifier: ErrorClassifier,
    safety: SafetySettings,
    max_message_chars: usize,
}

impl ChatRuntime {
    pub fn new(
        documents: Arc<DocumentCache>,
        prompt: PromptAssembler,
        generation: Arc<dyn GenerationClient>,
        contact: ContactSink,
    ) -> Self {
        Self {
            documents,
            prompt,
            generation,
            contact,
            extractor: ActionExtractor::new(),
            classifier: ErrorClassifier::new(),
            safety: SafetySettings::standard(),
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }

    pub fn with_max_message_chars(mut self, max_message_chars: usize) -> Self {
        self.max_message_chars = max_message_chars;
        self
    }

    pub fn documents(&self) -> &DocumentCache {
        &self.documents
    }

    pub fn generation_configured(&self) -> bool {
        self.generation.is_configured()
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let correlation_id = format!("req-{}", Uuid::new_v4().simple());
        self.handle_with_correlation(request, &correlation_id).await
    }

    pub async fn handle_with_correlation(
        &self,
        request: ChatRequest,
        correlation_id: &str,
    ) -> Result<ChatReply, ChatError> {
        let message = self.validate_message(request.message.as_deref())?;

        if !self.generation.is_configured() {
            error!(
                event_name = "chat.credential_missing",
                correlation_id,
                "generation credential is not configured"
            );
            return Err(ChatError::Configuration(
                "generation API key is not configured".to_string(),
            ));
        }

        let (resume, background) = tokio::join!(
            self.documents.get(DocumentKind::Resume),
            self.documents.get(DocumentKind::Background)
        );
        let system_instruction = self
            .prompt
            .build(&resume, &background)
            .map_err(|e| ChatError::Configuration(e.to_string()))?;

        let turns = history::project(request.history());
        info!(
            event_name = "chat.generate",
            correlation_id,
            history_turns = turns.len(),
            resume_bytes = resume.len(),
            background_bytes = background.len(),
            "invoking generation"
        );

        let generation_request = GenerationRequest {
            system_instruction,
            safety: self.safety.clone(),
            turns,
            message: message.to_string(),
        };

        let raw = match self.generation.generate(generation_request).await {
            Ok(text) => text,
            Err(failure) => {
                return match self.classifier.classify(&failure) {
                    Classified::Deflect(text) => {
                        warn!(
                            event_name = "chat.safety_deflection",
                            correlation_id,
                            error = %failure,
                            "generation blocked by safety filter; deflecting"
                        );
                        Ok(ChatReply { text })
                    }
                    Classified::Propagate(chat_error) => {
                        error!(
                            event_name = "chat.generation_failed",
                            correlation_id,
                            error = %failure,
                            "generation failed"
                        );
                        Err(chat_error)
                    }
                };
            }
        };

        let extracted = self.extractor.extract(&raw);
        info!(
            event_name = "chat.action_extracted",
            correlation_id,
            action = extracted.tag.as_str(),
            navigation_hint = extracted.navigation_hint,
            "reply scanned for action markers"
        );
        let mut text = extracted.text;

        match extracted.tag {
            ActionTag::ContactComplete(submission) => {
                match self.contact.persist(&submission).await {
                    Ok(record) => info!(
                        event_name = "chat.contact_saved",
                        correlation_id,
                        notification_id = %record.id.0,
                        "contact submission queued for delivery"
                    ),
                    Err(sink_error) => {
                        error!(
                            event_name = "chat.contact_save_failed",
                            correlation_id,
                            error = %sink_error,
                            "could not store contact submission"
                        );
                        text.push_str("\n\n");
                        text.push_str(SAVE_FAILED_NOTICE);
                    }
                }
            }
            ActionTag::ContactMalformed { raw_payload } => {
                error!(
                    event_name = "chat.contact_malformed",
                    correlation_id,
                    raw_payload = %raw_payload,
                    "contact marker payload could not be parsed"
                );
            }
            ActionTag::ShowProjects | ActionTag::None => {}
        }

        Ok(ChatReply { text })
    }

    fn validate_message<'a>(&self, message: Option<&'a str>) -> Result<&'a str, ChatError> {
        let message = message.filter(|message| !message.trim().is_empty()).ok_or_else(|| {
            ChatError::InvalidArgument("The 'message' field is required.".to_string())
        })?;

        if message.chars().count() > self.max_message_chars {
            return Err(ChatError::InvalidArgument(format!(
                "The 'message' field must be at most {} characters.",
                self.max_message_chars
            )));
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tracing::instrument::WithSubscriber;

    use folio_core::actions::{CONTACT_CONFIRMATION, CONTACT_PARSE_FAILURE_NOTICE};
    use folio_core::config::TimestampPolicy;
    use folio_core::domain::chat::{ChatRequest, ConversationTurn, TurnRole};
    use folio_core::errors::ChatError;
    use folio_core::notification::NotificationRenderer;
    use folio_core::prompt::{PromptAssembler, BACKGROUND_FALLBACK, RESUME_FALLBACK};
    use folio_db::repositories::{InMemoryNotificationRepository, NotificationRepository};

    use super::ChatRuntime;
    use crate::contact::{ContactSink, SAVE_FAILED_NOTICE};
    use crate::documents::{DocumentCache, DocumentError, DocumentSource};
    use crate::llm::{GenerationClient, GenerationError, GenerationRequest};
    use crate::safety::DEFLECTION_MESSAGE;

    struct StaticSource {
        background: Option<&'static str>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl DocumentSource for StaticSource {
        async fn fetch(&self, object: &str) -> Result<Vec<u8>, DocumentError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match (object, self.background) {
                ("background.txt", Some(text)) => Ok(text.as_bytes().to_vec()),
                _ => Err(DocumentError::NotFound { object: object.to_string() }),
            }
        }
    }

    /// Returns a fixed outcome and records every request it receives.
    struct FakeGeneration {
        configured: bool,
        outcome: fn() -> Result<String, GenerationError>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl FakeGeneration {
        fn replying(outcome: fn() -> Result<String, GenerationError>) -> Arc<Self> {
            Arc::new(Self { configured: true, outcome, requests: Mutex::new(Vec::new()) })
        }

        fn unconfigured() -> Arc<Self> {
            Arc::new(Self {
                configured: false,
                outcome: || Ok("unused".to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl GenerationClient for FakeGeneration {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            self.requests.lock().expect("requests lock").push(request);
            (self.outcome)()
        }
    }

    const CONTACT_MARKER: &str =
        r#"[[CONTACT_COMPLETE: {"name":"Ann","email":"a@x.com","message":"hi"}]]"#;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        runtime: ChatRuntime,
        source: Arc<StaticSource>,
        generation: Arc<FakeGeneration>,
        notifications: Arc<InMemoryNotificationRepository>,
    }

    fn harness(
        generation: Arc<FakeGeneration>,
        notifications: InMemoryNotificationRepository,
    ) -> Harness {
        let source = Arc::new(StaticSource {
            background: Some("Enjoys sailing and systems programming."),
            fetches: AtomicUsize::new(0),
        });
        let notifications = Arc::new(notifications);
        let documents =
            Arc::new(DocumentCache::new(source.clone(), "resume.pdf", "background.txt"));
        let prompt = PromptAssembler::new("Dana Reyes", TimestampPolicy::ProcessStart)
            .expect("prompt template");
        let contact = ContactSink::new(
            NotificationRenderer::new("owner@folio.dev").expect("renderer"),
            notifications.clone(),
        );
        let runtime = ChatRuntime::new(documents, prompt, generation.clone(), contact)
            .with_max_message_chars(200);

        Harness { runtime, source, generation, notifications }
    }

    fn default_harness(outcome: fn() -> Result<String, GenerationError>) -> Harness {
        harness(FakeGeneration::replying(outcome), InMemoryNotificationRepository::default())
    }

    #[tokio::test]
    async fn plain_reply_is_returned_verbatim() {
        let h = default_harness(|| Ok("I work on distributed systems.".to_string()));

        let reply = h.runtime.handle(ChatRequest::new("What do you do?")).await.expect("reply");

        assert_eq!(reply.text, "I work on distributed systems.");
        assert!(h.notifications.is_empty().await);
    }

    #[tokio::test]
    async fn missing_or_blank_message_is_invalid_argument() {
        let h = default_harness(|| Ok("unused".to_string()));

        let missing = h.runtime.handle(ChatRequest::default()).await;
        let blank = h.runtime.handle(ChatRequest::new("   ")).await;

        assert!(matches!(missing, Err(ChatError::InvalidArgument(_))));
        assert!(matches!(blank, Err(ChatError::InvalidArgument(_))));
        assert!(h.generation.requests().is_empty());
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_message_is_invalid_argument() {
        let h = default_harness(|| Ok("unused".to_string()));

        let result = h.runtime.handle(ChatRequest::new("x".repeat(201))).await;

        assert!(matches!(result, Err(ChatError::InvalidArgument(ref m)) if m.contains("200")));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_external_call() {
        let h = harness(FakeGeneration::unconfigured(), InMemoryNotificationRepository::default());

        let result = h.runtime.handle(ChatRequest::new("hello")).await;

        assert!(matches!(result, Err(ChatError::Configuration(_))));
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 0);
        assert!(h.generation.requests().is_empty());
    }

    #[tokio::test]
    async fn request_carries_prompt_history_and_safety() {
        let h = default_harness(|| Ok("ok".to_string()));
        let request = ChatRequest::new("And now?").with_history(vec![
            ConversationTurn::new("user", "Hi"),
            ConversationTurn::new("assistant", "Hello!"),
        ]);

        h.runtime.handle(request).await.expect("reply");

        let sent = h.generation.requests();
        assert_eq!(sent.len(), 1);
        let sent = &sent[0];
        assert_eq!(sent.message, "And now?");
        assert_eq!(sent.turns.len(), 2);
        assert_eq!(sent.turns[1].role, TurnRole::Model);
        assert_eq!(sent.safety.settings().len(), 4);
        assert!(sent.system_instruction.contains("Dana Reyes"));
        assert!(sent.system_instruction.contains("Enjoys sailing"));
        assert!(sent.system_instruction.contains(RESUME_FALLBACK));
        assert!(!sent.system_instruction.contains(BACKGROUND_FALLBACK));
    }

    #[tokio::test]
    async fn cached_document_is_fetched_once_and_missing_one_is_retried() {
        let h = default_harness(|| Ok("ok".to_string()));

        h.runtime.handle(ChatRequest::new("one")).await.expect("first");
        h.runtime.handle(ChatRequest::new("two")).await.expect("second");

        // background cached after the first request, resume retried each time
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn safety_block_becomes_deflection() {
        let h = default_harness(|| Err(GenerationError::Blocked { reason: "SAFETY".to_string() }));

        let reply = h.runtime.handle(ChatRequest::new("something rude")).await.expect("reply");

        assert_eq!(reply.text, DEFLECTION_MESSAGE);
    }

    #[tokio::test]
    async fn other_generation_failures_propagate() {
        let h = default_harness(|| Err(GenerationError::Transport("timed out".to_string())));

        let result = h.runtime.handle(ChatRequest::new("hello")).await;

        match result {
            Err(error) => {
                assert!(matches!(error, ChatError::Generation(_)));
                assert_eq!(error.status(), "internal");
            }
            Ok(reply) => panic!("expected failure, got {reply:?}"),
        }
    }

    #[tokio::test]
    async fn show_projects_marker_passes_through() {
        let h = default_harness(|| Ok("Thanks! [[SHOW_PROJECTS]]".to_string()));

        let reply = h.runtime.handle(ChatRequest::new("projects?")).await.expect("reply");

        assert_eq!(reply.text, "Thanks! [[SHOW_PROJECTS]]");
        assert!(h.notifications.is_empty().await);
    }

    #[tokio::test]
    async fn contact_completion_persists_exactly_one_notification() {
        let h = default_harness(|| Ok(CONTACT_MARKER.to_string()));

        let reply = h.runtime.handle(ChatRequest::new("that's all")).await.expect("reply");

        assert_eq!(reply.text, CONTACT_CONFIRMATION);
        let stored = h.notifications.list_recent(10).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].recipients, vec!["owner@folio.dev".to_string()]);
        assert_eq!(stored[0].subject, "New portfolio contact from Ann");
    }

    #[tokio::test]
    async fn malformed_contact_keeps_text_and_persists_nothing() {
        let h = default_harness(|| Ok("Saved! [[CONTACT_COMPLETE: {not valid json}]]".to_string()));

        let reply = h.runtime.handle(ChatRequest::new("done")).await.expect("reply");

        assert!(reply.text.contains("[[CONTACT_COMPLETE: {not valid json}]]"));
        assert!(reply.text.ends_with(CONTACT_PARSE_FAILURE_NOTICE));
        assert!(h.notifications.is_empty().await);
    }

    #[tokio::test]
    async fn sink_failure_appends_notice_and_still_succeeds() {
        let h = harness(
            FakeGeneration::replying(|| Ok(format!("Got it! {CONTACT_MARKER}"))),
            InMemoryNotificationRepository::failing(),
        );

        let reply = h.runtime.handle(ChatRequest::new("send it")).await.expect("reply");

        assert!(reply.text.starts_with("Got it!"));
        assert!(reply.text.ends_with(SAVE_FAILED_NOTICE));
        assert!(!reply.text.contains("CONTACT_COMPLETE"));
    }

    #[tokio::test]
    async fn contact_reply_logs_action_and_navigation_hint() {
        let h = default_harness(|| Ok(format!("{CONTACT_MARKER} [[SHOW_PROJECTS]]")));
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let reply = h
            .runtime
            .handle(ChatRequest::new("bye"))
            .with_subscriber(subscriber)
            .await
            .expect("reply");

        assert_eq!(reply.text, "[[SHOW_PROJECTS]]");
        assert_eq!(h.notifications.list_recent(10).await.expect("list").len(), 1);

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("chat.action_extracted"))
            .expect("action event should be logged");
        assert!(line.contains(r#"action="contact_complete""#), "{line}");
        assert!(line.contains("navigation_hint=true"), "{line}");
    }
}

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use crate::client::{ChatReply, ChatRequest, ChatTransport, ClientError, ResetReply};
use crate::elements::ChatElements;
use crate::message_log::{escape_html, PendingHandle};
use crate::tui::AppEvent;

pub const USER_LABEL: &str = "You";
pub const BOT_LABEL: &str = "Bot";
pub const WARNING_TEXT: &str = "⚠️ Something went wrong.";

/// How server-supplied `intent` and `response` are inserted into the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkupTrust {
    /// Insert as markup, unescaped
    #[default]
    TrustServer,
    AlwaysEscape,
}

/// Build the Bot entry markup for a successful reply.
///
/// Missing fields render the way an untyped client would show them:
/// `undefined` for text and `NaN` for the confidence.
pub fn format_reply(reply: &ChatReply, trust: MarkupTrust) -> String {
    let field = |value: &Option<String>| {
        let raw = value.as_deref().unwrap_or("undefined");
        match trust {
            MarkupTrust::TrustServer => raw.to_string(),
            MarkupTrust::AlwaysEscape => escape_html(raw),
        }
    };
    let confidence = reply.confidence.unwrap_or(f64::NAN) * 100.0;

    format!(
        "<div><strong>Intent:</strong> {} ({:.2}%)</div><div><strong>Response:</strong> {}</div>",
        field(&reply.intent),
        confidence,
        field(&reply.response),
    )
}

/// The chat widget controller.
///
/// Owns the UI elements it was attached to. Requests run on tokio tasks and
/// report back through the app event channel; all log changes happen on the
/// caller's thread.
pub struct ChatWidget {
    pub elements: ChatElements,
    transport: Arc<dyn ChatTransport>,
    events: mpsc::UnboundedSender<AppEvent>,
    trust: MarkupTrust,
}

impl ChatWidget {
    pub fn attach(
        elements: ChatElements,
        transport: Arc<dyn ChatTransport>,
        events: mpsc::UnboundedSender<AppEvent>,
        trust: MarkupTrust,
    ) -> Self {
        Self { elements, transport, events, trust }
    }

    pub fn trust(&self) -> MarkupTrust {
        self.trust
    }

    pub fn append_message(&mut self, sender: &str, content: &str, is_markup: bool) {
        self.elements.log.append(sender, content, is_markup);
    }

    /// Submit the input field. Blank input does nothing and returns `None`.
    pub fn send_current_input(&mut self) -> Option<PendingHandle> {
        let text = self.elements.input.value().trim().to_string();
        if text.is_empty() {
            return None;
        }
        let model = self.elements.model.value().to_string();

        self.append_message(USER_LABEL, &text, false);
        self.elements.input.clear();
        let pending = self.elements.log.append_pending();

        info!(model = %model, chars = text.chars().count(), "sending chat request");

        let request = ChatRequest { text, model };
        let transport = Arc::clone(&self.transport);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let outcome = transport.chat(&request).await;
            // Receiver gone means the app is shutting down
            let _ = tx.send(AppEvent::ChatSettled { pending, outcome });
        });

        Some(pending)
    }

    pub fn complete_chat(&mut self, pending: PendingHandle, outcome: Result<ChatReply, ClientError>) {
        if !self.elements.log.remove_pending(pending) {
            warn!(?pending, "pending placeholder already removed");
        }

        match outcome {
            Ok(reply) => {
                info!(intent = ?reply.intent, confidence = ?reply.confidence, "chat reply received");
                let markup = format_reply(&reply, self.trust);
                self.append_message(BOT_LABEL, &markup, true);
            }
            Err(err) => {
                error!(error = %err, "chat request failed");
                self.append_message(BOT_LABEL, WARNING_TEXT, false);
            }
        }
        debug!(entries = self.elements.log.len(), "chat log updated");
    }

    /// Ask the server to drop its conversation history.
    pub fn reset_conversation(&mut self) -> PendingHandle {
        let pending = self.elements.log.append_pending();
        info!("sending reset request");

        let transport = Arc::clone(&self.transport);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let outcome = transport.reset().await;
            let _ = tx.send(AppEvent::ResetSettled { pending, outcome });
        });

        pending
    }

    pub fn complete_reset(&mut self, pending: PendingHandle, outcome: Result<ResetReply, ClientError>) {
        if !self.elements.log.remove_pending(pending) {
            warn!(?pending, "pending placeholder already removed");
        }

        match outcome {
            Ok(reply) => {
                let message = reply.message.unwrap_or_else(|| "undefined".to_string());
                self.append_message(BOT_LABEL, &message, false);
            }
            Err(err) => {
                error!(error = %err, "reset request failed");
                self.append_message(BOT_LABEL, WARNING_TEXT, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTransport {
        requests: Mutex<Vec<ChatRequest>>,
        replies: Mutex<VecDeque<Result<ChatReply, ClientError>>>,
        resets: Mutex<usize>,
        reset_fails: bool,
    }

    impl FakeTransport {
        fn replying(replies: Vec<Result<ChatReply, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatReply::default()))
        }

        async fn reset(&self) -> Result<ResetReply, ClientError> {
            *self.resets.lock().unwrap() += 1;
            if self.reset_fails {
                return Err(decode_error());
            }
            Ok(ResetReply { message: Some("Conversation history cleared.".to_string()) })
        }
    }

    fn decode_error() -> ClientError {
        ClientError::Decode(serde_json::from_str::<serde_json::Value>("<html>").unwrap_err())
    }

    fn greeting() -> ChatReply {
        ChatReply {
            intent: Some("greeting".to_string()),
            confidence: Some(0.8765),
            response: Some("hi there".to_string()),
        }
    }

    fn attach_widget(
        transport: Arc<FakeTransport>,
        trust: MarkupTrust,
    ) -> (ChatWidget, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let elements = ChatElements::new(vec!["default".to_string()], "default");
        (ChatWidget::attach(elements, transport, tx, trust), rx)
    }

    /// Wait for the next chat settlement and feed it back to the widget.
    async fn settle_next(widget: &mut ChatWidget, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        match rx.recv().await {
            Some(AppEvent::ChatSettled { pending, outcome }) => widget.complete_chat(pending, outcome),
            Some(AppEvent::ResetSettled { pending, outcome }) => widget.complete_reset(pending, outcome),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        for blank in ["", " ", "\t\n  ", "\u{3000}"] {
            let transport = FakeTransport::replying(vec![]);
            let (mut widget, mut rx) = attach_widget(transport.clone(), MarkupTrust::TrustServer);
            widget.elements.input.set_value(blank);

            assert!(widget.send_current_input().is_none());
            assert!(widget.elements.log.is_empty());
            assert_eq!(widget.elements.input.value(), blank);

            tokio::task::yield_now().await;
            assert!(rx.try_recv().is_err());
            assert!(transport.requests().is_empty());
        }
    }

    #[tokio::test]
    async fn test_echo_and_placeholder_precede_request() {
        let transport = FakeTransport::replying(vec![Ok(greeting())]);
        let (mut widget, mut rx) = attach_widget(transport.clone(), MarkupTrust::TrustServer);
        widget.elements.input.set_value("  <b>Hello</b> & 'bye'  ");

        widget.send_current_input().unwrap();

        // The spawned task has not run yet on the current-thread runtime
        assert!(transport.requests().is_empty());
        let entries = widget.elements.log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sender.as_deref(), Some(USER_LABEL));
        assert_eq!(entries[0].body, "&lt;b&gt;Hello&lt;/b&gt; &amp; &#39;bye&#39;");
        assert!(entries[1].is_pending());
        assert_eq!(widget.elements.input.value(), "");

        settle_next(&mut widget, &mut rx).await;
        assert_eq!(transport.requests()[0].text, "<b>Hello</b> & 'bye'");
    }

    #[tokio::test]
    async fn test_request_payload_is_exact() {
        let transport = FakeTransport::replying(vec![Ok(greeting())]);
        let (mut widget, mut rx) = attach_widget(transport.clone(), MarkupTrust::TrustServer);
        widget.elements.input.set_value("Hello");

        widget.send_current_input();
        settle_next(&mut widget, &mut rx).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            serde_json::to_value(&requests[0]).unwrap(),
            serde_json::json!({"text": "Hello", "model": "default"})
        );
    }

    #[tokio::test]
    async fn test_success_renders_reply_and_removes_placeholder() {
        let transport = FakeTransport::replying(vec![Ok(greeting())]);
        let (mut widget, mut rx) = attach_widget(transport, MarkupTrust::TrustServer);
        widget.elements.input.set_value("hello");

        widget.send_current_input();
        settle_next(&mut widget, &mut rx).await;

        let entries = widget.elements.log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(widget.elements.log.pending_count(), 0);
        assert_eq!(entries[1].sender.as_deref(), Some(BOT_LABEL));
        assert!(entries[1].body.contains("greeting (87.65%)"));
        assert!(entries[1].body.contains("<strong>Response:</strong> hi there"));
    }

    #[tokio::test]
    async fn test_failure_appends_single_warning() {
        let transport = FakeTransport::replying(vec![Err(decode_error())]);
        let (mut widget, mut rx) = attach_widget(transport, MarkupTrust::TrustServer);
        widget.elements.input.set_value("hello");

        widget.send_current_input();
        settle_next(&mut widget, &mut rx).await;

        let entries = widget.elements.log.entries();
        let bot: Vec<_> = entries.iter().filter(|e| e.sender.as_deref() == Some(BOT_LABEL)).collect();
        assert_eq!(bot.len(), 1);
        assert_eq!(bot[0].body, WARNING_TEXT);
        assert_eq!(widget.elements.log.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_widget_usable_after_failure() {
        let transport = FakeTransport::replying(vec![Err(decode_error()), Ok(greeting())]);
        let (mut widget, mut rx) = attach_widget(transport.clone(), MarkupTrust::TrustServer);

        widget.elements.input.set_value("first");
        widget.send_current_input();
        settle_next(&mut widget, &mut rx).await;

        widget.elements.input.set_value("second");
        widget.send_current_input();
        settle_next(&mut widget, &mut rx).await;

        assert_eq!(transport.requests().len(), 2);
        assert_eq!(widget.elements.log.len(), 4);
        assert!(widget.elements.log.entries()[3].body.contains("87.65%"));
    }

    #[tokio::test]
    async fn test_overlapping_sends_remove_their_own_placeholders() {
        let transport = FakeTransport::replying(vec![
            Ok(ChatReply { intent: Some("first".into()), ..greeting() }),
            Ok(ChatReply { intent: Some("second".into()), ..greeting() }),
        ]);
        let (mut widget, mut rx) = attach_widget(transport, MarkupTrust::TrustServer);

        widget.elements.input.set_value("one");
        let first = widget.send_current_input().unwrap();
        widget.elements.input.set_value("two");
        let second = widget.send_current_input().unwrap();
        assert_ne!(first, second);
        assert_eq!(widget.elements.log.pending_count(), 2);

        let mut settled = Vec::new();
        for _ in 0..2 {
            match rx.recv().await {
                Some(AppEvent::ChatSettled { pending, outcome }) => settled.push((pending, outcome)),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        // Settle out of order: the second request's placeholder goes first
        let (p2, o2) = settled.pop().unwrap();
        assert_eq!(p2, second);
        widget.complete_chat(p2, o2);
        assert_eq!(widget.elements.log.pending_count(), 1);
        let remaining = widget.elements.log.entries().iter().find(|e| e.is_pending()).unwrap();
        assert_eq!(remaining.id, widget.elements.log.entries()[1].id);

        let (p1, o1) = settled.pop().unwrap();
        widget.complete_chat(p1, o1);
        assert_eq!(widget.elements.log.pending_count(), 0);

        let bodies: Vec<_> = widget.elements.log.entries().iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies.len(), 4);
        assert!(bodies[2].contains("second"));
        assert!(bodies[3].contains("first"));

        // A stale handle removes nothing
        assert!(!widget.elements.log.remove_pending(first));
    }

    #[tokio::test]
    async fn test_reset_appends_server_message() {
        let transport = FakeTransport::replying(vec![]);
        let (mut widget, mut rx) = attach_widget(transport.clone(), MarkupTrust::TrustServer);

        widget.reset_conversation();
        assert_eq!(widget.elements.log.pending_count(), 1);
        settle_next(&mut widget, &mut rx).await;

        assert_eq!(*transport.resets.lock().unwrap(), 1);
        assert_eq!(widget.elements.log.pending_count(), 0);
        assert_eq!(widget.elements.log.entries()[0].body, "Conversation history cleared.");
    }

    #[tokio::test]
    async fn test_reset_failure_appends_single_warning() {
        let transport = Arc::new(FakeTransport { reset_fails: true, ..Default::default() });
        let (mut widget, mut rx) = attach_widget(transport.clone(), MarkupTrust::TrustServer);

        widget.reset_conversation();
        settle_next(&mut widget, &mut rx).await;

        assert_eq!(*transport.resets.lock().unwrap(), 1);
        assert_eq!(widget.elements.log.pending_count(), 0);
        let entries = widget.elements.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sender.as_deref(), Some(BOT_LABEL));
        assert_eq!(entries[0].body, escape_html(WARNING_TEXT));
    }

    #[tokio::test]
    async fn test_stale_reset_handle_still_reports() {
        let transport = FakeTransport::replying(vec![]);
        let (mut widget, mut rx) = attach_widget(transport, MarkupTrust::TrustServer);

        let pending = widget.reset_conversation();
        assert!(widget.elements.log.remove_pending(pending));
        settle_next(&mut widget, &mut rx).await;

        assert_eq!(widget.elements.log.len(), 1);
        assert_eq!(widget.elements.log.entries()[0].body, "Conversation history cleared.");
    }

    #[test]
    fn test_format_reply_two_decimals() {
        let markup = format_reply(&greeting(), MarkupTrust::TrustServer);
        assert_eq!(
            markup,
            "<div><strong>Intent:</strong> greeting (87.65%)</div><div><strong>Response:</strong> hi there</div>"
        );

        let whole = ChatReply { confidence: Some(1.0), ..greeting() };
        assert!(format_reply(&whole, MarkupTrust::TrustServer).contains("(100.00%)"));
        let tiny = ChatReply { confidence: Some(0.0), ..greeting() };
        assert!(format_reply(&tiny, MarkupTrust::TrustServer).contains("(0.00%)"));
    }

    #[test]
    fn test_format_reply_missing_fields() {
        let markup = format_reply(&ChatReply::default(), MarkupTrust::TrustServer);
        assert!(markup.contains("<strong>Intent:</strong> undefined (NaN%)"));
        assert!(markup.contains("<strong>Response:</strong> undefined"));
    }

    #[test]
    fn test_markup_trust_modes() {
        let reply = ChatReply {
            intent: Some("<i>weather</i>".to_string()),
            confidence: Some(0.5),
            response: Some("<b>sunny</b> & warm".to_string()),
        };

        let trusted = format_reply(&reply, MarkupTrust::TrustServer);
        assert!(trusted.contains("<i>weather</i> (50.00%)"));
        assert!(trusted.contains("<b>sunny</b> & warm"));

        let escaped = format_reply(&reply, MarkupTrust::AlwaysEscape);
        assert!(escaped.contains("&lt;i&gt;weather&lt;/i&gt; (50.00%)"));
        assert!(escaped.contains("&lt;b&gt;sunny&lt;/b&gt; &amp; warm"));
    }
}

use super::{Button, MessageSink};
use crate::error::Result;

/// Test-mode sink: every message goes to the admin, tagged with the
/// recipient it was meant for.
pub struct RedirectSink<S> {
    inner: S,
    admin: String,
}

impl<S: MessageSink> RedirectSink<S> {
    pub fn new(inner: S, admin: impl Into<String>) -> Self {
        Self {
            inner,
            admin: admin.into(),
        }
    }
}

impl<S: MessageSink> MessageSink for RedirectSink<S> {
    fn send(&self, recipient: &str, text: &str, buttons: &[Vec<Button>]) -> Result<()> {
        let tagged = format!("<i>[test → {recipient}]</i>\n{text}");
        self.inner.send(&self.admin, &tagged, buttons)
    }
}

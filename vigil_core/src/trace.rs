use serde::{Deserialize, Serialize};

/// Identity of one span inside a trace.
///
/// A root context starts a fresh `trace_id`; every child produced by
/// [`TraceContext::new_span`] keeps that `trace_id`, gets a new `span_id`
/// and points back at its parent. The passthrough identifiers are copied to
/// children untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self {
            trace_id: new_id(),
            span_id: new_id(),
            parent_span_id: None,
            user_id: None,
            session_id: None,
            request_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn new_span(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_id(),
            parent_span_id: Some(self.span_id.clone()),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            request_id: self.request_id.clone(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

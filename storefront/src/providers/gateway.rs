//! Gateway hand-off provider trait.

use crate::error::Result;
use crate::gateway::{FormPost, SubmissionMode};
use reqwest::Url;

/// Performs navigation on behalf of the checkout flow.
///
/// A browser host posts the form and rewrites the address bar; a native
/// host can open a web view. Implementations must not inspect the fields.
pub trait GatewayBridge: Send + Sync {
    /// Submit a gateway form.
    ///
    /// # Errors
    ///
    /// Returns error if the host could not perform the submission.
    fn submit(
        &self,
        post: FormPost,
        mode: SubmissionMode,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Replace the current location without adding a history entry.
    ///
    /// # Errors
    ///
    /// Returns error if the host could not update its location.
    fn replace_location(&self, url: &Url) -> Result<()>;
}

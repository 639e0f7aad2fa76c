//! Two-phase confirmation for destructive actions

/// A held effect awaiting an explicit accept or decline
///
/// Nothing happens until [`Confirmation::resolve`] is called; dropping the
/// value is equivalent to declining.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a confirmation does nothing until resolved"]
pub struct Confirmation<A> {
    effect: A,
    message: String,
}

impl<A> Confirmation<A> {
    /// Hold `effect` behind a prompt
    #[inline]
    pub fn request(effect: A, message: impl Into<String>) -> Self {
        Self {
            effect,
            message: message.into(),
        }
    }

    /// Prompt shown to the user
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The held effect
    #[inline]
    #[must_use]
    pub fn effect(&self) -> &A {
        &self.effect
    }

    /// Release the effect on accept, discard it on decline
    #[inline]
    #[must_use]
    pub fn resolve(self, accept: bool) -> Option<A> {
        accept.then_some(self.effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_releases_effect() {
        let pending = Confirmation::request(7, "really?");
        assert_eq!(pending.message(), "really?");
        assert_eq!(pending.resolve(true), Some(7));
    }

    #[test]
    fn decline_discards_effect() {
        let pending = Confirmation::request("wipe", "really?");
        assert_eq!(pending.resolve(false), None);
    }
}

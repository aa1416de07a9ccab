//! Escalation gate: when to interrupt a guest with an authentication prompt.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Distinct content views before the usage-limit prompt opens.
pub const USAGE_LIMIT_THRESHOLD: u64 = 2;

/// Why an escalation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTrigger {
    #[default]
    None,
    /// Guest has viewed enough content.
    UsageLimit,
    /// Content that is never available anonymously. Cannot be skipped.
    RestrictedContent,
    /// User asked to sign in.
    Manual,
}

impl EscalationTrigger {
    /// Whether a prompt for this trigger offers a skip affordance.
    pub fn is_dismissible(&self) -> bool {
        !matches!(self, EscalationTrigger::RestrictedContent)
    }
}

impl std::str::FromStr for EscalationTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "usage_limit" => Ok(Self::UsageLimit),
            "restricted_content" => Ok(Self::RestrictedContent),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown escalation trigger: {}", other)),
        }
    }
}

/// Facts the gate decides on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateInput {
    pub is_authenticated: bool,
    pub content_accessed_count: u64,
}

/// An open authentication prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPrompt {
    pub trigger: EscalationTrigger,
    pub dismissible: bool,
}

impl EscalationPrompt {
    fn for_trigger(trigger: EscalationTrigger) -> Self {
        Self {
            trigger,
            dismissible: trigger.is_dismissible(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum EscalationDecision {
    /// Nothing to show.
    NotRequired,
    /// The user already dismissed this trigger.
    Suppressed,
    /// A prompt was opened by this request.
    Opened(EscalationPrompt),
    /// A prompt was already showing; it stays as is.
    AlreadyOpen(EscalationPrompt),
}

impl EscalationDecision {
    /// The prompt on screen after this decision, if any.
    pub fn prompt(&self) -> Option<EscalationPrompt> {
        match self {
            EscalationDecision::Opened(prompt) | EscalationDecision::AlreadyOpen(prompt) => {
                Some(*prompt)
            }
            _ => None,
        }
    }
}

/// Decision surface plus the little state it needs: the open prompt and the
/// triggers dismissed since the last reset.
#[derive(Debug, Clone)]
pub struct EscalationGate {
    threshold: u64,
    open: Option<EscalationPrompt>,
    dismissed: HashSet<EscalationTrigger>,
}

impl Default for EscalationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl EscalationGate {
    pub fn new() -> Self {
        Self::with_threshold(USAGE_LIMIT_THRESHOLD)
    }

    /// Gate with a custom usage-limit threshold (minimum 1).
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            open: None,
            dismissed: HashSet::new(),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<EscalationPrompt> {
        self.open
    }

    pub fn is_dismissed(&self, trigger: EscalationTrigger) -> bool {
        self.dismissed.contains(&trigger)
    }

    /// Evaluate `trigger` and open a prompt if warranted.
    ///
    /// A non-dismissible prompt replaces an open dismissible one; otherwise
    /// an open prompt is left in place.
    pub fn request(&mut self, trigger: EscalationTrigger, input: GateInput) -> EscalationDecision {
        let warranted = match trigger {
            EscalationTrigger::None => false,
            EscalationTrigger::UsageLimit => input.content_accessed_count >= self.threshold,
            EscalationTrigger::RestrictedContent | EscalationTrigger::Manual => true,
        };

        if input.is_authenticated || !warranted {
            return EscalationDecision::NotRequired;
        }
        if self.dismissed.contains(&trigger) {
            return EscalationDecision::Suppressed;
        }

        let prompt = EscalationPrompt::for_trigger(trigger);
        match self.open {
            Some(current) if current.trigger == trigger => EscalationDecision::AlreadyOpen(current),
            Some(current) if current.dismissible && !prompt.dismissible => {
                debug!(from = ?current.trigger, to = ?trigger, "Escalation replaced");
                self.open = Some(prompt);
                EscalationDecision::Opened(prompt)
            }
            Some(current) => EscalationDecision::AlreadyOpen(current),
            None => {
                debug!(trigger = ?trigger, "Escalation opened");
                self.open = Some(prompt);
                EscalationDecision::Opened(prompt)
            }
        }
    }

    /// Dismiss the open prompt. Returns false if nothing was open or the
    /// prompt cannot be skipped.
    pub fn dismiss(&mut self) -> bool {
        match self.open {
            Some(prompt) if prompt.dismissible => {
                self.dismissed.insert(prompt.trigger);
                self.open = None;
                debug!(trigger = ?prompt.trigger, "Escalation dismissed");
                true
            }
            _ => false,
        }
    }

    /// Forget dismissals and close any prompt, e.g. on navigation to new content.
    pub fn reset(&mut self) {
        self.dismissed.clear();
        self.open = None;
    }

    /// Close the gate after a successful login or registration.
    /// Returns whether a prompt was open.
    pub fn close_for_authentication(&mut self) -> bool {
        let was_open = self.open.take().is_some();
        self.dismissed.clear();
        was_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(count: u64) -> GateInput {
        GateInput {
            is_authenticated: false,
            content_accessed_count: count,
        }
    }

    #[test]
    fn test_usage_limit_below_threshold_never_opens() {
        let mut gate = EscalationGate::new();
        for _ in 0..5 {
            assert_eq!(
                gate.request(EscalationTrigger::UsageLimit, guest(1)),
                EscalationDecision::NotRequired
            );
        }
        assert!(!gate.is_open());
    }

    #[test]
    fn test_usage_limit_at_threshold_opens_once() {
        let mut gate = EscalationGate::new();

        let first = gate.request(EscalationTrigger::UsageLimit, guest(USAGE_LIMIT_THRESHOLD));
        assert!(matches!(first, EscalationDecision::Opened(_)));

        let again = gate.request(EscalationTrigger::UsageLimit, guest(USAGE_LIMIT_THRESHOLD));
        assert!(matches!(again, EscalationDecision::AlreadyOpen(_)));
    }

    #[test]
    fn test_dismissed_trigger_stays_quiet_until_reset() {
        let mut gate = EscalationGate::new();
        gate.request(EscalationTrigger::UsageLimit, guest(2));
        assert!(gate.dismiss());

        assert_eq!(
            gate.request(EscalationTrigger::UsageLimit, guest(3)),
            EscalationDecision::Suppressed
        );
        assert!(!gate.is_open());

        gate.reset();
        assert!(matches!(
            gate.request(EscalationTrigger::UsageLimit, guest(4)),
            EscalationDecision::Opened(_)
        ));
    }

    #[test]
    fn test_dismissal_is_per_trigger() {
        let mut gate = EscalationGate::new();
        gate.request(EscalationTrigger::Manual, guest(0));
        assert!(gate.dismiss());

        assert!(matches!(
            gate.request(EscalationTrigger::UsageLimit, guest(2)),
            EscalationDecision::Opened(_)
        ));
    }

    #[test]
    fn test_restricted_content_cannot_be_skipped() {
        let mut gate = EscalationGate::new();
        let decision = gate.request(EscalationTrigger::RestrictedContent, guest(0));

        let prompt = decision.prompt().unwrap();
        assert!(!prompt.dismissible);
        assert!(!gate.dismiss());
        assert!(gate.is_open());
    }

    #[test]
    fn test_restricted_content_replaces_soft_prompt() {
        let mut gate = EscalationGate::new();
        gate.request(EscalationTrigger::Manual, guest(0));

        let decision = gate.request(EscalationTrigger::RestrictedContent, guest(0));
        assert_eq!(
            decision,
            EscalationDecision::Opened(EscalationPrompt {
                trigger: EscalationTrigger::RestrictedContent,
                dismissible: false,
            })
        );

        // A soft trigger does not displace the hard gate.
        let soft = gate.request(EscalationTrigger::UsageLimit, guest(2));
        assert_eq!(soft.prompt().unwrap().trigger, EscalationTrigger::RestrictedContent);
    }

    #[test]
    fn test_authenticated_users_are_never_prompted() {
        let mut gate = EscalationGate::new();
        let input = GateInput {
            is_authenticated: true,
            content_accessed_count: 10,
        };
        assert_eq!(
            gate.request(EscalationTrigger::RestrictedContent, input),
            EscalationDecision::NotRequired
        );
    }

    #[test]
    fn test_none_trigger_is_inert() {
        let mut gate = EscalationGate::new();
        assert_eq!(
            gate.request(EscalationTrigger::None, guest(100)),
            EscalationDecision::NotRequired
        );
    }

    #[test]
    fn test_close_for_authentication() {
        let mut gate = EscalationGate::new();
        assert!(!gate.close_for_authentication());

        gate.request(EscalationTrigger::RestrictedContent, guest(0));
        assert!(gate.close_for_authentication());
        assert!(!gate.is_open());
        assert!(gate.current().is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let mut gate = EscalationGate::with_threshold(3);
        assert_eq!(
            gate.request(EscalationTrigger::UsageLimit, guest(2)),
            EscalationDecision::NotRequired
        );
        assert!(gate.request(EscalationTrigger::UsageLimit, guest(3)).prompt().is_some());
        assert_eq!(EscalationGate::with_threshold(0).threshold(), 1);
    }

    #[test]
    fn test_trigger_parsing() {
        assert_eq!("usage-limit".parse::<EscalationTrigger>().unwrap(), EscalationTrigger::UsageLimit);
        assert_eq!(
            "restricted_content".parse::<EscalationTrigger>().unwrap(),
            EscalationTrigger::RestrictedContent
        );
        assert!("sometimes".parse::<EscalationTrigger>().is_err());
    }
}

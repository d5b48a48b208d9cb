// sentinel-governance/src/output_validator.rs
// ============================================================================
// Module: Output Validator
// Description: Detects factual claims in outbound text and checks them against known facts.
// Purpose: Catch an agent asserting something contradicted by, or unverifiable against, the fact store.
// Dependencies: regex, sentinel_config, sentinel_providers (optional LLM stage)
// ============================================================================

//! ## Overview
//! Three stages (`spec.md` §4.11):
//!
//! 1. **Detect** — a fixed regex catalogue pulls candidate claims out of
//!    outbound text: system-state, entity-name, existence, operational-status,
//!    and self-referential ("I ...") claims.
//! 2. **Check** — each claim is looked up in an in-memory fact registry keyed
//!    `lower(subject)|lower(predicate)`, falling back to a subject-only
//!    lookup when the exact predicate isn't known; self-referential claims
//!    probe the fixed subject `"self"`.
//! 3. **Verdict** — contradictions always win over unverified claims. A
//!    contradiction's disposition is trust-mapped (block below
//!    `block_below`, flag below `flag_above`, otherwise allowed with a
//!    note); unverified claims fall back to `unverifiedClaimPolicy` /
//!    `selfReferentialPolicy`.
//!
//! An optional fourth stage lets an LLM fact-check claims tagged as
//! referring to something external to the sandbox, mirroring
//! `sentinel-trace`'s classification call.

use std::collections::HashMap;

use regex::Regex;
use sentinel_config::ClaimPolicy;
use sentinel_config::LlmSettings;
use sentinel_config::OutputValidatorSettings;
use sentinel_providers::llm::ChatMessage;
use sentinel_providers::llm::LlmClient;
use sentinel_providers::llm::LlmRequest;
use serde::Deserialize;

const SELF_SUBJECT: &str = "self";

/// What kind of assertion a detected [`Claim`] makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// "X is configured to Y" / "X has been set to Y".
    SystemState,
    /// "the file/service/agent/database/server NAME".
    EntityName,
    /// "X exists" / "there is no X".
    Existence,
    /// "X is running/online/offline/down/...".
    OperationalStatus,
    /// "I am/have/can/did ...".
    SelfReferential,
}

/// One factual assertion pulled out of outbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Which detector produced this claim.
    pub kind: ClaimKind,
    /// The thing the claim is about.
    pub subject: String,
    /// The relation asserted between subject and object.
    pub predicate: String,
    /// The asserted value.
    pub object: String,
    /// The source text span this claim was extracted from.
    pub raw: String,
}

struct Detector {
    kind: ClaimKind,
    predicate: &'static str,
    pattern: Regex,
}

/// Pre-compiled claim-detection regex catalogue (`spec.md` §4.11 stage 1).
pub struct ClaimDetector {
    detectors: Vec<Detector>,
}

impl Default for ClaimDetector {
    #[allow(clippy::expect_used, reason = "detector patterns are compile-time constants, vetted by tests")]
    fn default() -> Self {
        let specs: &[(ClaimKind, &str, &str)] = &[
            (
                ClaimKind::OperationalStatus,
                "status",
                r"(?i)\b([A-Za-z][\w.\-/ ]{1,39}?)\s+is\s+(running|online|offline|down|active|inactive|healthy|unhealthy|degraded)\b",
            ),
            (
                ClaimKind::SystemState,
                "configured",
                r"(?i)\b([A-Za-z][\w.\-/ ]{1,39}?)\s+(?:is configured to|has been set to|currently has)\s+([\w.\-/ ]{1,40})\b",
            ),
            (
                ClaimKind::Existence,
                "exists",
                r"(?i)\bthere (?:is|are) no\s+([\w.\-/ ]{2,40})\b",
            ),
            (
                ClaimKind::Existence,
                "exists",
                r"(?i)\b([A-Za-z][\w.\-/ ]{1,39}?)\s+(exists|does not exist)\b",
            ),
            (
                ClaimKind::EntityName,
                "named",
                r"(?i)\bthe (?:file|service|agent|database|server)\s+([\w./\-]{2,60})\b",
            ),
            (
                ClaimKind::SelfReferential,
                "claims",
                r"(?i)\bI\s+(am|have|can|cannot|will|did|did not)\s+([\w.\-/ ]{2,60})",
            ),
        ];
        let detectors = specs
            .iter()
            .map(|(kind, predicate, pattern)| Detector {
                kind: *kind,
                predicate,
                pattern: Regex::new(pattern).expect("built-in claim pattern must compile"),
            })
            .collect();
        Self { detectors }
    }
}

impl ClaimDetector {
    /// Builds the detector catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts every claim the catalogue recognizes in `text`, in source order.
    #[must_use]
    pub fn detect(&self, text: &str) -> Vec<Claim> {
        let mut claims = Vec::new();
        for detector in &self.detectors {
            for caps in detector.pattern.captures_iter(text) {
                let whole = caps.get(0).map_or("", |m| m.as_str()).to_string();
                match detector.kind {
                    ClaimKind::Existence if caps.len() == 2 => {
                        claims.push(Claim {
                            kind: detector.kind,
                            subject: caps[1].trim().to_string(),
                            predicate: detector.predicate.to_string(),
                            object: "false".to_string(),
                            raw: whole,
                        });
                    }
                    ClaimKind::EntityName => {
                        claims.push(Claim {
                            kind: detector.kind,
                            subject: caps[1].trim().to_string(),
                            predicate: detector.predicate.to_string(),
                            object: caps[1].trim().to_string(),
                            raw: whole,
                        });
                    }
                    ClaimKind::SelfReferential => {
                        claims.push(Claim {
                            kind: detector.kind,
                            subject: SELF_SUBJECT.to_string(),
                            predicate: detector.predicate.to_string(),
                            object: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
                            raw: whole,
                        });
                    }
                    _ => {
                        claims.push(Claim {
                            kind: detector.kind,
                            subject: caps[1].trim().to_string(),
                            predicate: detector.predicate.to_string(),
                            object: caps.get(2).map_or("true", |m| m.as_str()).trim().to_string(),
                            raw: whole,
                        });
                    }
                }
            }
        }
        claims
    }
}

// ============================================================================
// SECTION: Fact registry & verdicts
// ============================================================================

/// In-memory fact-check registry keyed `lower(subject)|lower(predicate)`.
#[derive(Debug, Clone, Default)]
pub struct FactRegistry {
    by_subject_predicate: HashMap<(String, String), String>,
}

fn key(subject: &str, predicate: &str) -> (String, String) {
    (subject.to_lowercase(), predicate.to_lowercase())
}

impl FactRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a known `(subject, predicate) -> object` fact, overwriting
    /// any prior value for the same key.
    pub fn record(&mut self, subject: &str, predicate: &str, object: &str) {
        self.by_subject_predicate.insert(key(subject, predicate), object.to_string());
    }

    fn lookup(&self, subject: &str, predicate: &str) -> Option<&str> {
        self.by_subject_predicate.get(&key(subject, predicate)).map(String::as_str)
    }

    fn knows_subject(&self, subject: &str) -> bool {
        let subject = subject.to_lowercase();
        self.by_subject_predicate.keys().any(|(s, _)| s == &subject)
    }
}

/// Outcome of checking one [`Claim`] against a [`FactRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimVerdict {
    /// The registry has this exact `(subject, predicate)` and it matches.
    Confirmed,
    /// The registry has this exact `(subject, predicate)` and it disagrees.
    Contradicted,
    /// Nothing on record confirms or denies this claim.
    Unverified,
}

fn check_claim(claim: &Claim, registry: &FactRegistry) -> ClaimVerdict {
    let subject = if claim.kind == ClaimKind::SelfReferential { SELF_SUBJECT } else { claim.subject.as_str() };
    if let Some(known) = registry.lookup(subject, &claim.predicate) {
        return if known.eq_ignore_ascii_case(&claim.object) { ClaimVerdict::Confirmed } else { ClaimVerdict::Contradicted };
    }
    // No exact (subject, predicate) fact, but the subject is known under some
    // other predicate: that settles a bare existence claim either way.
    if claim.kind == ClaimKind::Existence && registry.knows_subject(subject) {
        return if claim.object == "false" { ClaimVerdict::Contradicted } else { ClaimVerdict::Confirmed };
    }
    ClaimVerdict::Unverified
}

// ============================================================================
// SECTION: Disposition
// ============================================================================

/// What the validator recommends doing with the outbound text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationAction {
    /// Let the message through unchanged.
    Allow,
    /// Let the message through, annotated with a note.
    Flag,
    /// Block the message entirely.
    Block,
}

/// Full result of validating one piece of outbound text.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// The most severe action any claim triggered.
    pub action: ValidationAction,
    /// Human-readable notes explaining the action.
    pub notes: Vec<String>,
    /// Every detected claim alongside its check verdict.
    pub claims: Vec<(Claim, ClaimVerdict)>,
}

fn policy_action(policy: ClaimPolicy) -> ValidationAction {
    match policy {
        ClaimPolicy::Ignore => ValidationAction::Allow,
        ClaimPolicy::Flag => ValidationAction::Flag,
        ClaimPolicy::Block => ValidationAction::Block,
    }
}

/// Detects and checks every claim in `text`, then derives a disposition
/// (`spec.md` §4.11 stage 3). `trust_score` maps a contradiction to block,
/// flag, or allow-with-note.
#[must_use]
pub fn validate(
    detector: &ClaimDetector,
    text: &str,
    registry: &FactRegistry,
    trust_score: f64,
    settings: &OutputValidatorSettings,
) -> ValidationOutcome {
    let claims = detector.detect(text);
    let mut checked = Vec::with_capacity(claims.len());
    let mut action = ValidationAction::Allow;
    let mut notes = Vec::new();

    for claim in claims {
        let verdict = check_claim(&claim, registry);
        match verdict {
            ClaimVerdict::Contradicted => {
                let contradiction_action = if trust_score < settings.block_below {
                    ValidationAction::Block
                } else if trust_score < settings.flag_above {
                    ValidationAction::Flag
                } else {
                    notes.push(format!("unverified note: \"{}\" contradicts a known fact", claim.raw));
                    ValidationAction::Allow
                };
                if contradiction_action != ValidationAction::Allow {
                    notes.push(format!("contradiction: \"{}\"", claim.raw));
                }
                action = action.max(contradiction_action);
            }
            ClaimVerdict::Unverified => {
                let policy = if claim.kind == ClaimKind::SelfReferential {
                    settings.self_referential_policy
                } else {
                    settings.unverified_claim_policy
                };
                let claim_action = policy_action(policy);
                if claim_action != ValidationAction::Allow {
                    notes.push(format!("unverified claim: \"{}\"", claim.raw));
                }
                action = action.max(claim_action);
            }
            ClaimVerdict::Confirmed => {}
        }
        checked.push((claim, verdict));
    }

    ValidationOutcome { action, notes, claims: checked }
}

// ============================================================================
// SECTION: Optional LLM fact-check stage
// ============================================================================

#[derive(Debug, Deserialize)]
struct LlmFactCheckReply {
    contradicted: bool,
    #[serde(default)]
    explanation: String,
}

/// Asks an LLM whether `claim` (believed to refer to something outside the
/// sandbox, where no local fact can confirm or deny it) is contradicted by
/// general knowledge. Returns `None` on any transport or parse failure,
/// leaving the claim `Unverified`.
pub async fn llm_fact_check(
    client: &LlmClient,
    settings: &LlmSettings,
    claim: &Claim,
) -> Option<bool> {
    let endpoint = settings.endpoint.as_ref()?;
    let prompt = format!(
        "Does this statement contradict well-established facts? Reply with JSON \
         {{\"contradicted\":boolean,\"explanation\":string}}.\n\nstatement: {}",
        claim.raw
    );
    let mut request = LlmRequest::with_defaults(endpoint, &settings.model, vec![
        ChatMessage::system("You fact-check statements against general knowledge. Reply with JSON only."),
        ChatMessage::user(prompt),
    ]);
    request.api_key.clone_from(&settings.api_key);
    request.timeout = std::time::Duration::from_millis(settings.timeout_ms);

    let raw = client.complete(&request).await.ok()?;
    let reply: LlmFactCheckReply = serde_json::from_str(&raw).ok()?;
    Some(reply.contradicted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    fn settings() -> OutputValidatorSettings {
        OutputValidatorSettings {
            flag_above: 60.0,
            block_below: 40.0,
            unverified_claim_policy: ClaimPolicy::Flag,
            self_referential_policy: ClaimPolicy::Flag,
        }
    }

    #[test]
    fn detects_operational_status_claim() {
        let detector = ClaimDetector::new();
        let claims = detector.detect("the payments service is offline right now");
        assert!(claims.iter().any(|c| c.kind == ClaimKind::OperationalStatus && c.object == "offline"));
    }

    #[test]
    fn detects_self_referential_claim() {
        let detector = ClaimDetector::new();
        let claims = detector.detect("I cannot access that directory");
        assert!(claims.iter().any(|c| c.kind == ClaimKind::SelfReferential && c.subject == "self"));
    }

    #[test]
    fn confirmed_claim_does_not_escalate() {
        let detector = ClaimDetector::new();
        let mut registry = FactRegistry::new();
        registry.record("payments service", "status", "offline");
        let outcome = validate(&detector, "the payments service is offline", &registry, 100.0, &settings());
        assert_eq!(outcome.action, ValidationAction::Allow);
        assert!(outcome.claims.iter().any(|(_, v)| *v == ClaimVerdict::Confirmed));
    }

    #[test]
    fn contradiction_blocks_at_low_trust() {
        let detector = ClaimDetector::new();
        let mut registry = FactRegistry::new();
        registry.record("payments service", "status", "online");
        let outcome = validate(&detector, "the payments service is offline", &registry, 10.0, &settings());
        assert_eq!(outcome.action, ValidationAction::Block);
    }

    #[test]
    fn contradiction_flags_at_medium_trust() {
        let detector = ClaimDetector::new();
        let mut registry = FactRegistry::new();
        registry.record("payments service", "status", "online");
        let outcome = validate(&detector, "the payments service is offline", &registry, 50.0, &settings());
        assert_eq!(outcome.action, ValidationAction::Flag);
    }

    #[test]
    fn contradiction_passes_with_note_at_high_trust() {
        let detector = ClaimDetector::new();
        let mut registry = FactRegistry::new();
        registry.record("payments service", "status", "online");
        let outcome = validate(&detector, "the payments service is offline", &registry, 90.0, &settings());
        assert_eq!(outcome.action, ValidationAction::Allow);
        assert!(!outcome.notes.is_empty());
    }

    #[test]
    fn existence_claim_falls_back_to_subject_presence() {
        let detector = ClaimDetector::new();
        let mut registry = FactRegistry::new();
        registry.record("backup cluster", "status", "healthy");
        let outcome = validate(&detector, "there is no backup cluster", &registry, 100.0, &settings());
        assert!(outcome.claims.iter().any(|(_, v)| *v == ClaimVerdict::Contradicted));
    }

    #[test]
    fn unverified_claim_follows_configured_policy() {
        let detector = ClaimDetector::new();
        let registry = FactRegistry::new();
        let outcome = validate(&detector, "the cache service is running", &registry, 100.0, &settings());
        assert_eq!(outcome.action, ValidationAction::Flag);
    }

    #[test]
    fn ignore_policy_suppresses_unverified_claims() {
        let detector = ClaimDetector::new();
        let registry = FactRegistry::new();
        let mut cfg = settings();
        cfg.unverified_claim_policy = ClaimPolicy::Ignore;
        let outcome = validate(&detector, "the cache service is running", &registry, 100.0, &cfg);
        assert_eq!(outcome.action, ValidationAction::Allow);
    }
}

// sentinel-governance/src/policy.rs
// ============================================================================
// Module: Policy Index & Evaluator
// Description: Compile and evaluate rule conditions against a context.
// Purpose: The hot-path decision engine invoked on every tool call and outbound message.
// Dependencies: sentinel_logic, sentinel_core, regex, serde_json
// ============================================================================

//! ## Overview
//! Policies are authored as JSON ([`RawPolicy`]) and compiled once into
//! [`Policy`] (`spec.md` §4.7): every regex-bearing condition passes
//! through a shared [`RegexCache`], glob patterns included, and disabled
//! policies are dropped before indexing. [`PolicyIndex`] pre-expands the
//! compiled set into `byHook`/`byAgent` tables so evaluation never scans
//! the full policy list.
//!
//! A rule's ordered condition list becomes a top-level
//! [`sentinel_logic::Requirement::And`]; the `composite (any-of)` and
//! `negation (not)` condition kinds recurse into `Or`/`Not` rather than
//! existing as [`Condition`] leaves, per `sentinel-logic`'s own design.
//!
//! Evaluation resolves own-agent, globally-scoped (`"*"`), and one level of
//! parent-agent policies, walks each in-scope policy's rules in order (the
//! first rule whose trust-tier gate passes and conditions all hold is its
//! match), then aggregates: deny wins across every matched policy
//! regardless of priority.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use sentinel_core::AgentId;
use sentinel_core::ChannelId;
use sentinel_core::PolicyId;
use sentinel_core::RuleId;
use sentinel_core::interfaces::HookName;
use sentinel_logic::PredicateEval;
use sentinel_logic::Requirement;
use sentinel_logic::TriState;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::frequency::FrequencyScope;
use crate::frequency::FrequencyTracker;
use crate::risk::RiskLevel;
use crate::trust::TrustTier;

const MAX_PATTERN_LEN: usize = 500;
const ALL_HOOKS: [HookName; 9] = [
    HookName::SessionStart,
    HookName::BeforeAgentStart,
    HookName::BeforeToolCall,
    HookName::AfterToolCall,
    HookName::ToolResultPersist,
    HookName::BeforeMessageWrite,
    HookName::MessageSending,
    HookName::GatewayStart,
    HookName::GatewayStop,
];
const WILDCARD_AGENT: &str = "*";

// ============================================================================
// SECTION: Compile-time errors
// ============================================================================

/// Failure compiling a raw policy into the indexed form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyCompileError {
    /// A regex (or glob, compiled to one) exceeded the 500-char cap.
    #[error("pattern \"{0}\" exceeds the 500-char limit")]
    PatternTooLong(String),
    /// A regex looked like it could backtrack catastrophically.
    #[error("pattern \"{0}\" rejected: nested quantifiers risk catastrophic backtracking")]
    NestedQuantifier(String),
    /// A regex failed to compile outright.
    #[error("pattern \"{0}\" does not compile: {1}")]
    InvalidRegex(String, String),
}

#[allow(clippy::expect_used, reason = "nested-quantifier heuristic pattern is a compile-time constant")]
fn has_nested_quantifier(pattern: &str) -> bool {
    let heuristic = Regex::new(r"\([^()]*[+*][^()]*\)[+*]").expect("heuristic regex must compile");
    heuristic.is_match(pattern)
}

/// Compiles and caches regex patterns so identical patterns across
/// conditions share one [`Regex`] instance (`spec.md` §4.7).
#[derive(Default)]
struct RegexCache(HashMap<String, Arc<Regex>>);

impl RegexCache {
    fn compile(&mut self, pattern: &str) -> Result<Arc<Regex>, PolicyCompileError> {
        if let Some(existing) = self.0.get(pattern) {
            return Ok(Arc::clone(existing));
        }
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(PolicyCompileError::PatternTooLong(pattern.to_string()));
        }
        if has_nested_quantifier(pattern) {
            return Err(PolicyCompileError::NestedQuantifier(pattern.to_string()));
        }
        let compiled =
            Regex::new(pattern).map_err(|e| PolicyCompileError::InvalidRegex(pattern.to_string(), e.to_string()))?;
        let arc = Arc::new(compiled);
        self.0.insert(pattern.to_string(), Arc::clone(&arc));
        Ok(arc)
    }

    fn compile_glob(&mut self, glob: &str) -> Result<Arc<Regex>, PolicyCompileError> {
        let mut pattern = String::from("^");
        for ch in glob.chars() {
            match ch {
                '*' => pattern.push_str(".*"),
                '?' => pattern.push('.'),
                c if r"\.+^$()[]{}|".contains(c) => {
                    pattern.push('\\');
                    pattern.push(c);
                }
                c => pattern.push(c),
            }
        }
        pattern.push('$');
        self.compile(&pattern)
    }
}

// ============================================================================
// SECTION: Raw (authored) shapes
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

/// Parameter or metadata value predicate (`spec.md` §3: "matches-regex,
/// contains, equals").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawParamPredicate {
    /// Key looked up in the params or metadata map.
    pub key: String,
    /// The check applied to the looked-up value.
    #[serde(flatten)]
    pub check: RawParamCheck,
}

/// Raw (string-pattern) form of a parameter check, before regex compilation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum RawParamCheck {
    /// Value must match this regex pattern.
    MatchesRegex {
        /// Regex source, validated and compiled at index time.
        pattern: String,
    },
    /// Value must contain this substring.
    Contains {
        /// Substring to search for.
        value: String,
    },
    /// Value must equal this JSON value exactly.
    Equals {
        /// Expected value.
        value: Value,
    },
}

/// Authored condition shape, as loaded from policy JSON (`spec.md` §3).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RawCondition {
    /// Matches a tool call by name and/or parameter predicates.
    Tool {
        /// Exact tool name, if constrained.
        name: Option<String>,
        /// Parameter predicates, all of which must hold.
        #[serde(default)]
        params: Vec<RawParamPredicate>,
    },
    /// Matches a time-of-day window and/or day-of-week set.
    Time {
        /// Minute-of-day (UTC) the window opens, inclusive.
        after_min: Option<u16>,
        /// Minute-of-day (UTC) the window closes, exclusive. `after_min >
        /// before_min` wraps past midnight.
        before_min: Option<u16>,
        /// Allowed days of week, 0 (Sunday) through 6 (Saturday).
        days: Option<Vec<u8>>,
    },
    /// Matches the acting agent's identity, trust tier, or trust score.
    Agent {
        /// Glob pattern (`*`, `?`) matched against the agent id.
        id_glob: Option<String>,
        /// Minimum trust tier, inclusive.
        min_tier: Option<TrustTier>,
        /// Maximum trust tier, inclusive.
        max_tier: Option<TrustTier>,
        /// Minimum trust score, inclusive.
        min_score: Option<f64>,
        /// Maximum trust score, inclusive.
        max_score: Option<f64>,
    },
    /// Matches channel, session key, or conversation metadata.
    Context {
        /// Exact channel id.
        channel: Option<String>,
        /// Glob pattern matched against the session key.
        session_key_glob: Option<String>,
        /// Metadata predicates, all of which must hold.
        #[serde(default)]
        metadata: Vec<RawParamPredicate>,
    },
    /// Matches the context's assessed risk level.
    Risk {
        /// Minimum risk level, inclusive.
        min_level: Option<RiskLevel>,
        /// Maximum risk level, inclusive.
        max_level: Option<RiskLevel>,
    },
    /// Matches a rate-limit threshold over the frequency tracker.
    Frequency {
        /// Condition holds once the live count reaches this threshold.
        max_count: u32,
        /// Lookback window, in seconds.
        window_seconds: u64,
        /// Scope the count is grouped by.
        scope: FrequencyScope,
    },
    /// True if any nested condition is true.
    Composite {
        /// Nested conditions; any one satisfies this node.
        any_of: Vec<RawCondition>,
    },
    /// True if the nested condition is false.
    Negation {
        /// Nested condition to invert.
        not: Box<RawCondition>,
    },
}

/// Authored rule effect.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Effect {
    /// Let the operation proceed.
    Allow,
    /// Block the operation, with a human-readable reason.
    Deny {
        /// Reason surfaced in the verdict and audit record.
        reason: String,
    },
    /// Let the operation proceed, but flag it in the audit log at `level`.
    Audit {
        /// Severity label attached to the audit entry.
        level: String,
    },
}

impl Effect {
    /// Lowercase label used in audit records.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny { .. } => "deny",
            Self::Audit { .. } => "audit",
        }
    }
}

/// Authored rule shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    /// Rule identifier, unique within its policy.
    pub id: String,
    /// Ordered condition list; implicit AND.
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
    /// Rule only applies at or above this trust tier.
    pub min_trust_tier: Option<TrustTier>,
    /// Rule only applies at or below this trust tier.
    pub max_trust_tier: Option<TrustTier>,
    /// What happens when this rule matches.
    pub effect: Effect,
}

/// Scope narrowing which contexts a policy applies to.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyScope {
    /// Hooks this policy applies to; `None` means every hook.
    pub hooks: Option<Vec<HookName>>,
    /// Agent ids this policy applies to; `None` means every agent.
    pub agents: Option<Vec<String>>,
    /// Agent ids explicitly excluded even if otherwise in scope.
    pub exclude_agents: Option<Vec<String>>,
    /// Channel ids this policy applies to; `None` means every channel.
    pub channels: Option<Vec<String>>,
}

/// Authored policy shape, as loaded from policy JSON.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPolicy {
    /// Stable policy identifier.
    pub id: String,
    /// Schema version for this policy document.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Whether this policy is active; disabled policies are dropped at index time.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scope narrowing when this policy applies.
    pub scope: Option<PolicyScope>,
    /// Diagnostic ordering only; decision is deny-wins regardless of priority.
    #[serde(default)]
    pub priority: i32,
    /// Compliance control identifiers attached to every match from this policy.
    #[serde(default)]
    pub controls: Vec<String>,
    /// Ordered rules; the first whose conditions all hold wins.
    pub rules: Vec<RawRule>,
}

// ============================================================================
// SECTION: Compiled conditions
// ============================================================================

/// Compiled parameter/metadata check, regex patterns pre-compiled.
#[derive(Debug, Clone)]
pub enum ParamCheck {
    /// Pre-compiled regex match.
    MatchesRegex(Arc<Regex>),
    /// Substring containment.
    Contains(String),
    /// Exact JSON equality.
    Equals(Value),
}

impl ParamCheck {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::MatchesRegex(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Self::Contains(needle) => {
                value.as_str().is_some_and(|s| s.contains(needle.as_str())) || value.to_string().contains(needle.as_str())
            }
            Self::Equals(expected) => value == expected,
        }
    }
}

/// Compiled parameter/metadata predicate.
#[derive(Debug, Clone)]
pub struct ParamPredicate {
    /// Key looked up in the params or metadata map.
    pub key: String,
    /// Check applied to the looked-up value.
    pub check: ParamCheck,
}

/// Compiled atomic policy condition, the `P` in `Requirement<Condition>`
/// (`spec.md` §3; `composite`/`negation` are not leaves here — they
/// compile to `Requirement::Or`/`Not` instead, see module docs).
#[derive(Debug, Clone)]
pub enum Condition {
    /// Tool name and/or parameter predicates.
    Tool {
        /// Exact tool name, if constrained.
        name: Option<String>,
        /// Parameter predicates, all of which must hold.
        params: Vec<ParamPredicate>,
    },
    /// Time-of-day window and/or day-of-week set.
    Time {
        /// Window open, minute-of-day UTC, inclusive.
        after_min: Option<u16>,
        /// Window close, minute-of-day UTC, exclusive.
        before_min: Option<u16>,
        /// Allowed days of week, 0 (Sunday) through 6 (Saturday).
        days: Option<Vec<u8>>,
    },
    /// Agent identity, trust tier, or trust score.
    Agent {
        /// Compiled glob regex matched against the agent id.
        id_glob: Option<Arc<Regex>>,
        /// Minimum trust tier, inclusive.
        min_tier: Option<TrustTier>,
        /// Maximum trust tier, inclusive.
        max_tier: Option<TrustTier>,
        /// Minimum trust score, inclusive.
        min_score: Option<f64>,
        /// Maximum trust score, inclusive.
        max_score: Option<f64>,
    },
    /// Channel, session key, or conversation metadata.
    Context {
        /// Exact channel id.
        channel: Option<String>,
        /// Compiled glob regex matched against the session key.
        session_key_glob: Option<Arc<Regex>>,
        /// Metadata predicates, all of which must hold.
        metadata: Vec<ParamPredicate>,
    },
    /// Assessed risk level bounds.
    Risk {
        /// Minimum risk level, inclusive.
        min_level: Option<RiskLevel>,
        /// Maximum risk level, inclusive.
        max_level: Option<RiskLevel>,
    },
    /// Rate-limit threshold over the frequency tracker.
    Frequency {
        /// Condition holds once the live count reaches this threshold.
        max_count: u32,
        /// Lookback window, in seconds.
        window_seconds: u64,
        /// Scope the count is grouped by.
        scope: FrequencyScope,
    },
}

fn compile_param(raw: &RawParamPredicate, cache: &mut RegexCache) -> Result<ParamPredicate, PolicyCompileError> {
    let check = match &raw.check {
        RawParamCheck::MatchesRegex { pattern } => ParamCheck::MatchesRegex(cache.compile(pattern)?),
        RawParamCheck::Contains { value } => ParamCheck::Contains(value.clone()),
        RawParamCheck::Equals { value } => ParamCheck::Equals(value.clone()),
    };
    Ok(ParamPredicate { key: raw.key.clone(), check })
}

fn compile_condition(raw: &RawCondition, cache: &mut RegexCache) -> Result<Requirement<Condition>, PolicyCompileError> {
    match raw {
        RawCondition::Composite { any_of } => {
            let nested = any_of.iter().map(|c| compile_condition(c, cache)).collect::<Result<Vec<_>, _>>()?;
            Ok(Requirement::or(nested))
        }
        RawCondition::Negation { not } => Ok(Requirement::negate(compile_condition(not, cache)?)),
        RawCondition::Tool { name, params } => {
            let params = params.iter().map(|p| compile_param(p, cache)).collect::<Result<Vec<_>, _>>()?;
            Ok(Requirement::Predicate(Condition::Tool { name: name.clone(), params }))
        }
        RawCondition::Time { after_min, before_min, days } => {
            Ok(Requirement::Predicate(Condition::Time { after_min: *after_min, before_min: *before_min, days: days.clone() }))
        }
        RawCondition::Agent { id_glob, min_tier, max_tier, min_score, max_score } => {
            let id_glob = id_glob.as_deref().map(|g| cache.compile_glob(g)).transpose()?;
            Ok(Requirement::Predicate(Condition::Agent {
                id_glob,
                min_tier: *min_tier,
                max_tier: *max_tier,
                min_score: *min_score,
                max_score: *max_score,
            }))
        }
        RawCondition::Context { channel, session_key_glob, metadata } => {
            let session_key_glob = session_key_glob.as_deref().map(|g| cache.compile_glob(g)).transpose()?;
            let metadata = metadata.iter().map(|p| compile_param(p, cache)).collect::<Result<Vec<_>, _>>()?;
            Ok(Requirement::Predicate(Condition::Context { channel: channel.clone(), session_key_glob, metadata }))
        }
        RawCondition::Risk { min_level, max_level } => {
            Ok(Requirement::Predicate(Condition::Risk { min_level: *min_level, max_level: *max_level }))
        }
        RawCondition::Frequency { max_count, window_seconds, scope } => Ok(Requirement::Predicate(Condition::Frequency {
            max_count: *max_count,
            window_seconds: *window_seconds,
            scope: *scope,
        })),
    }
}

// ============================================================================
// SECTION: Evaluation context
// ============================================================================

/// The context a [`PolicyIndex`] evaluates a decision against.
pub struct PolicyContext<'a> {
    /// The hook being dispatched.
    pub hook: HookName,
    /// The acting agent.
    pub agent: AgentId,
    /// The acting agent's parent, for sub-agent sessions.
    pub parent_agent: Option<AgentId>,
    /// Session key, used by sessionKey-glob and session-scoped frequency conditions.
    pub session_key: String,
    /// Channel, if any.
    pub channel: Option<ChannelId>,
    /// Tool name, for tool-call hooks.
    pub tool_name: Option<&'a str>,
    /// Tool parameters, for tool-call hooks.
    pub tool_params: &'a serde_json::Map<String, Value>,
    /// Conversation/session metadata.
    pub metadata: &'a serde_json::Map<String, Value>,
    /// The agent's current trust score.
    pub trust_score: f64,
    /// The agent's current trust tier.
    pub trust_tier: TrustTier,
    /// The assessed risk level for this context.
    pub risk_level: RiskLevel,
    /// Current time, epoch ms.
    pub now_ms: i64,
    /// Current hour, UTC, 0..24.
    pub hour_utc: u32,
    /// Current minute of day, UTC, 0..1440.
    pub minute_utc: u32,
    /// Current day of week, 0 (Sunday) through 6 (Saturday).
    pub day_of_week: u8,
    /// Frequency tracker backing `frequency` conditions.
    pub frequency: &'a FrequencyTracker,
}

fn time_window_matches(minute: u32, after: u16, before: u16) -> bool {
    let (after, before) = (u32::from(after), u32::from(before));
    if after <= before { (after..before).contains(&minute) } else { minute >= after || minute < before }
}

impl PredicateEval<PolicyContext<'_>> for Condition {
    fn eval(&self, ctx: &PolicyContext<'_>) -> TriState {
        match self {
            Self::Tool { name, params } => {
                let Some(tool_name) = ctx.tool_name else { return TriState::Unknown };
                if let Some(expected) = name {
                    if expected != tool_name {
                        return TriState::False;
                    }
                }
                for p in params {
                    let Some(value) = ctx.tool_params.get(&p.key) else { return TriState::False };
                    if !p.check.matches(value) {
                        return TriState::False;
                    }
                }
                TriState::True
            }
            Self::Time { after_min, before_min, days } => {
                if let Some(allowed) = days {
                    if !allowed.contains(&ctx.day_of_week) {
                        return TriState::False;
                    }
                }
                let holds = match (after_min, before_min) {
                    (Some(a), Some(b)) => time_window_matches(ctx.minute_utc, *a, *b),
                    (Some(a), None) => ctx.minute_utc >= u32::from(*a),
                    (None, Some(b)) => ctx.minute_utc < u32::from(*b),
                    (None, None) => true,
                };
                TriState::from(holds)
            }
            Self::Agent { id_glob, min_tier, max_tier, min_score, max_score } => {
                if let Some(glob) = id_glob {
                    if !glob.is_match(ctx.agent.as_str()) {
                        return TriState::False;
                    }
                }
                if min_tier.is_some_and(|min| ctx.trust_tier < min)
                    || max_tier.is_some_and(|max| ctx.trust_tier > max)
                    || min_score.is_some_and(|min| ctx.trust_score < min)
                    || max_score.is_some_and(|max| ctx.trust_score > max)
                {
                    return TriState::False;
                }
                TriState::True
            }
            Self::Context { channel, session_key_glob, metadata } => {
                if let Some(expected) = channel {
                    let matches = ctx.channel.as_ref().is_some_and(|c| c.as_str() == expected);
                    if !matches {
                        return TriState::False;
                    }
                }
                if let Some(glob) = session_key_glob {
                    if !glob.is_match(&ctx.session_key) {
                        return TriState::False;
                    }
                }
                for p in metadata {
                    let Some(value) = ctx.metadata.get(&p.key) else { return TriState::False };
                    if !p.check.matches(value) {
                        return TriState::False;
                    }
                }
                TriState::True
            }
            Self::Risk { min_level, max_level } => {
                if min_level.is_some_and(|min| ctx.risk_level < min) || max_level.is_some_and(|max| ctx.risk_level > max)
                {
                    return TriState::False;
                }
                TriState::True
            }
            Self::Frequency { max_count, window_seconds, scope } => {
                let count = ctx.frequency.count(ctx.now_ms, *window_seconds, *scope, &ctx.agent, &ctx.session_key);
                TriState::from(count >= *max_count)
            }
        }
    }
}

// ============================================================================
// SECTION: Compiled policy / rule
// ============================================================================

/// Compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule identifier.
    pub id: RuleId,
    /// Ordered condition list, compiled to a top-level AND.
    pub condition: Requirement<Condition>,
    /// Rule only applies at or above this trust tier.
    pub min_trust_tier: Option<TrustTier>,
    /// Rule only applies at or below this trust tier.
    pub max_trust_tier: Option<TrustTier>,
    /// What happens when this rule matches.
    pub effect: Effect,
}

/// Compiled policy.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Stable policy identifier.
    pub id: PolicyId,
    /// Schema version.
    pub version: u32,
    /// Scope narrowing when this policy applies.
    pub scope: Option<PolicyScope>,
    /// Diagnostic ordering only.
    pub priority: i32,
    /// Compliance controls attached to every match from this policy.
    pub controls: Vec<String>,
    /// Ordered rules.
    pub rules: Vec<Rule>,
}

impl Policy {
    fn in_scope(&self, ctx: &PolicyContext<'_>) -> bool {
        let Some(scope) = &self.scope else { return true };
        if let Some(hooks) = &scope.hooks {
            if !hooks.contains(&ctx.hook) {
                return false;
            }
        }
        if let Some(exclude) = &scope.exclude_agents {
            if exclude.iter().any(|a| a == ctx.agent.as_str()) {
                return false;
            }
        }
        if let Some(channels) = &scope.channels {
            let matches = ctx.channel.as_ref().is_some_and(|c| channels.iter().any(|ch| ch == c.as_str()));
            if !matches {
                return false;
            }
        }
        true
    }

    fn first_match(&self, ctx: &PolicyContext<'_>) -> Option<&Rule> {
        self.rules.iter().find(|rule| {
            if rule.min_trust_tier.is_some_and(|min| ctx.trust_tier < min)
                || rule.max_trust_tier.is_some_and(|max| ctx.trust_tier > max)
            {
                return false;
            }
            rule.condition.eval(ctx).map(TriState::to_bool_fail_closed).unwrap_or(false)
        })
    }
}

fn compile_rule(raw: &RawRule, cache: &mut RegexCache) -> Result<Rule, PolicyCompileError> {
    let compiled = raw.conditions.iter().map(|c| compile_condition(c, cache)).collect::<Result<Vec<_>, _>>()?;
    Ok(Rule {
        id: RuleId::from(raw.id.as_str()),
        condition: Requirement::and(compiled),
        min_trust_tier: raw.min_trust_tier,
        max_trust_tier: raw.max_trust_tier,
        effect: raw.effect.clone(),
    })
}

fn compile_policy(raw: &RawPolicy, cache: &mut RegexCache) -> Result<Policy, PolicyCompileError> {
    let rules = raw.rules.iter().map(|r| compile_rule(r, cache)).collect::<Result<Vec<_>, _>>()?;
    Ok(Policy {
        id: PolicyId::from(raw.id.as_str()),
        version: raw.version,
        scope: raw.scope.clone(),
        priority: raw.priority,
        controls: raw.controls.clone(),
        rules,
    })
}

// ============================================================================
// SECTION: Index & verdict
// ============================================================================

/// One matched (policy, rule) pair contributing to a [`PolicyVerdict`].
#[derive(Debug, Clone)]
pub struct PolicyMatch {
    /// Policy that matched.
    pub policy_id: PolicyId,
    /// Rule within that policy that matched.
    pub rule_id: RuleId,
    /// The rule's effect.
    pub effect: Effect,
    /// Controls inherited from the matched policy.
    pub controls: Vec<String>,
}

/// Aggregate result of evaluating a [`PolicyContext`].
#[derive(Debug, Clone)]
pub struct PolicyVerdict {
    /// Whether the operation is allowed.
    pub allow: bool,
    /// Reason: the first deny's reason, or a canonical "no matching policies" string.
    pub reason: String,
    /// Every matched (policy, rule) pair, in evaluation order.
    pub matches: Vec<PolicyMatch>,
}

/// Pre-expanded, compiled policy set (`spec.md` §4.7).
pub struct PolicyIndex {
    by_hook: HashMap<HookName, Vec<Arc<Policy>>>,
    by_agent: HashMap<String, Vec<Arc<Policy>>>,
}

impl PolicyIndex {
    /// Compiles `raw_policies` into an index, dropping disabled policies.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyCompileError`] if any condition's regex or glob
    /// pattern is invalid, too long, or looks catastrophically backtracking.
    pub fn build(raw_policies: &[RawPolicy]) -> Result<Self, PolicyCompileError> {
        let mut cache = RegexCache::default();
        let mut policies = Vec::new();
        for raw in raw_policies {
            if !raw.enabled {
                continue;
            }
            policies.push(Arc::new(compile_policy(raw, &mut cache)?));
        }

        let mut by_hook: HashMap<HookName, Vec<Arc<Policy>>> = HashMap::new();
        let mut by_agent: HashMap<String, Vec<Arc<Policy>>> = HashMap::new();
        for policy in &policies {
            match policy.scope.as_ref().and_then(|s| s.hooks.clone()) {
                Some(hooks) => {
                    for hook in hooks {
                        by_hook.entry(hook).or_default().push(Arc::clone(policy));
                    }
                }
                None => {
                    for hook in ALL_HOOKS {
                        by_hook.entry(hook).or_default().push(Arc::clone(policy));
                    }
                }
            }
            match policy.scope.as_ref().and_then(|s| s.agents.clone()) {
                Some(agents) => {
                    for agent in agents {
                        by_agent.entry(agent).or_default().push(Arc::clone(policy));
                    }
                }
                None => by_agent.entry(WILDCARD_AGENT.to_string()).or_default().push(Arc::clone(policy)),
            }
        }
        Ok(Self { by_hook, by_agent })
    }

    fn collect_group(&self, key: &str, ctx: &PolicyContext<'_>, seen: &mut HashSet<PolicyId>, out: &mut Vec<Arc<Policy>>) {
        let Some(candidates) = self.by_agent.get(key) else { return };
        for policy in candidates {
            if policy.in_scope(ctx) && seen.insert(policy.id.clone()) {
                out.push(Arc::clone(policy));
            }
        }
    }

    /// Evaluates `ctx` against the indexed policy set (`spec.md` §4.7).
    #[must_use]
    pub fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyVerdict {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        self.collect_group(ctx.agent.as_str(), ctx, &mut seen, &mut candidates);
        self.collect_group(WILDCARD_AGENT, ctx, &mut seen, &mut candidates);
        if let Some(parent) = &ctx.parent_agent {
            self.collect_group(parent.as_str(), ctx, &mut seen, &mut candidates);
        }
        candidates.retain(|policy| self.by_hook.get(&ctx.hook).is_some_and(|list| list.iter().any(|p| p.id == policy.id)));

        let mut matches = Vec::new();
        for policy in &candidates {
            if let Some(rule) = policy.first_match(ctx) {
                matches.push(PolicyMatch {
                    policy_id: policy.id.clone(),
                    rule_id: rule.id.clone(),
                    effect: rule.effect.clone(),
                    controls: policy.controls.clone(),
                });
            }
        }

        let mut deny_reason = None;
        for m in &matches {
            if let Effect::Deny { reason } = &m.effect {
                deny_reason = Some(reason.clone());
                break;
            }
        }
        if let Some(reason) = deny_reason {
            return PolicyVerdict { allow: false, reason, matches };
        }
        if matches.is_empty() {
            return PolicyVerdict { allow: true, reason: "no matching policies".to_string(), matches };
        }
        PolicyVerdict { allow: true, reason: "matched an allow or audit policy".to_string(), matches }
    }
}

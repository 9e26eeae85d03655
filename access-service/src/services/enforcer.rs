//! Casbin-backed rule set answering `(role, action, resource)` queries.
//!
//! A request is allowed when the role is the configured superadmin, or when
//! some rule has the same role, an action pattern (regular expression,
//! anchored at both ends) matching the action, and a path pattern matching
//! the resource under the configured path matcher.

use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi};
use regex::Regex;
use std::sync::{RwLock, RwLockReadGuard};
use tokio::sync::Mutex;

use super::error::ServiceError;
use crate::models::Policy;

/// Casbin matching function used to compare a concrete path with a stored
/// pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathMatcher {
    /// `*` matches any run of characters.
    KeyMatch,
    /// `:name` matches one segment and `/*` matches the rest of the path.
    #[default]
    KeyMatch2,
    /// `{name}` matches one segment and `/*` matches the rest of the path.
    KeyMatch3,
    Exact,
}

impl PathMatcher {
    fn expression(self) -> &'static str {
        match self {
            Self::KeyMatch => "keyMatch(r.obj, p.obj)",
            Self::KeyMatch2 => "keyMatch2(r.obj, p.obj)",
            Self::KeyMatch3 => "keyMatch3(r.obj, p.obj)",
            Self::Exact => "r.obj == p.obj",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub role: String,
    /// `<service type>:<method pattern>`, e.g. `http:GET` or `http:(GET|POST)`.
    pub action: String,
    pub path: String,
}

impl PolicyRule {
    pub fn new(role: impl Into<String>, action: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            action: action.into(),
            path: path.into(),
        }
    }

    /// The casbin row for this rule, once both patterns are known to compile.
    fn to_casbin(&self, path_matcher: PathMatcher) -> Result<Vec<String>, ServiceError> {
        let action = format!("^(?:{})$", self.action);
        Regex::new(&action).map_err(|e| {
            ServiceError::InvalidPolicy(format!("action pattern {:?}: {}", self.action, e))
        })?;
        if path_matcher == PathMatcher::KeyMatch2 {
            Regex::new(&format!("^{}$", self.path.replace("/*", "/.*"))).map_err(|e| {
                ServiceError::InvalidPolicy(format!("path pattern {:?}: {}", self.path, e))
            })?;
        }

        Ok(vec![self.role.clone(), action, self.path.clone()])
    }
}

impl From<&Policy> for PolicyRule {
    fn from(policy: &Policy) -> Self {
        Self::new(
            policy.role.clone(),
            format!("{}:{}", policy.service_type, policy.method),
            policy.path.clone(),
        )
    }
}

struct RuleSet {
    rules: Vec<PolicyRule>,
    enforcer: Enforcer,
}

pub struct PolicyEngine {
    superadmin_role: String,
    path_matcher: PathMatcher,
    current: RwLock<RuleSet>,
    // Serializes rebuilds so add/replace never race each other.
    writer: Mutex<()>,
}

impl PolicyEngine {
    pub async fn new(superadmin_role: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_path_matcher(superadmin_role, PathMatcher::default()).await
    }

    pub async fn with_path_matcher(
        superadmin_role: impl Into<String>,
        path_matcher: PathMatcher,
    ) -> Result<Self, ServiceError> {
        let superadmin_role = superadmin_role.into();
        let enforcer = build_enforcer(&superadmin_role, path_matcher, Vec::new()).await?;

        Ok(Self {
            superadmin_role,
            path_matcher,
            current: RwLock::new(RuleSet {
                rules: Vec::new(),
                enforcer,
            }),
            writer: Mutex::new(()),
        })
    }

    pub fn superadmin_role(&self) -> &str {
        &self.superadmin_role
    }

    pub fn path_matcher(&self) -> PathMatcher {
        self.path_matcher
    }

    pub fn enforce(&self, role: &str, action: &str, path: &str) -> Result<bool, ServiceError> {
        let current = self.read()?;
        current.enforcer.enforce((role, action, path)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("policy enforcement failed: {}", e))
        })
    }

    pub async fn clear_policy(&self) -> Result<(), ServiceError> {
        self.replace_policy(Vec::new()).await.map(|_| ())
    }

    /// Returns `false` when an identical rule is already present.
    pub async fn add_policy(&self, rule: PolicyRule) -> Result<bool, ServiceError> {
        let _writer = self.writer.lock().await;

        let mut rules = self.read()?.rules.clone();
        if rules.contains(&rule) {
            return Ok(false);
        }
        rules.push(rule);
        self.rebuild(rules).await?;
        Ok(true)
    }

    /// Swap in a whole new rule set. The replacement enforcer is built and
    /// every pattern checked before the swap, so a bad pattern leaves the
    /// current set in force and readers never observe a half-built set.
    pub async fn replace_policy<I>(&self, rules: I) -> Result<usize, ServiceError>
    where
        I: IntoIterator<Item = PolicyRule>,
    {
        let _writer = self.writer.lock().await;

        let mut unique: Vec<PolicyRule> = Vec::new();
        for rule in rules {
            if !unique.contains(&rule) {
                unique.push(rule);
            }
        }
        self.rebuild(unique).await
    }

    pub fn rules(&self) -> Result<Vec<PolicyRule>, ServiceError> {
        Ok(self.read()?.rules.clone())
    }

    async fn rebuild(&self, rules: Vec<PolicyRule>) -> Result<usize, ServiceError> {
        let enforcer =
            build_enforcer(&self.superadmin_role, self.path_matcher, rules.clone()).await?;
        let count = rules.len();

        let mut current = self
            .current
            .write()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("policy lock poisoned")))?;
        *current = RuleSet { rules, enforcer };
        Ok(count)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RuleSet>, ServiceError> {
        self.current
            .read()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("policy lock poisoned")))
    }
}

fn model_text(superadmin_role: &str, path_matcher: PathMatcher) -> String {
    format!(
        r#"
[request_definition]
r = sub, act, obj

[policy_definition]
p = sub, act, obj

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == {:?} || (r.sub == p.sub && regexMatch(r.act, p.act) && {})
"#,
        superadmin_role,
        path_matcher.expression()
    )
}

async fn build_enforcer(
    superadmin_role: &str,
    path_matcher: PathMatcher,
    rules: Vec<PolicyRule>,
) -> Result<Enforcer, ServiceError> {
    let policies = rules
        .iter()
        .map(|rule| rule.to_casbin(path_matcher))
        .collect::<Result<Vec<_>, _>>()?;

    let model = DefaultModel::from_str(&model_text(superadmin_role, path_matcher))
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("policy model: {}", e)))?;
    let mut enforcer = Enforcer::new(model, MemoryAdapter::default())
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("policy enforcer: {}", e)))?;

    if !policies.is_empty() {
        enforcer
            .add_policies(policies)
            .await
            .map_err(|e| ServiceError::InvalidPolicy(e.to_string()))?;
    }
    Ok(enforcer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    async fn engine() -> PolicyEngine {
        let engine = PolicyEngine::new("superadmin").await.unwrap();
        engine
            .replace_policy(vec![
                PolicyRule::new("member", "http:GET", "/user/:id"),
                PolicyRule::new("member", "http:(POST|PUT)", "/profile/*"),
                PolicyRule::new("auditor", "http:GET", "/reports"),
            ])
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn key_match2_params() {
        let engine = engine().await;

        assert!(engine.enforce("member", "http:GET", "/user/42").unwrap());
        assert!(!engine.enforce("member", "http:GET", "/user/42/orders").unwrap());
        assert!(!engine.enforce("member", "http:GET", "/user/").unwrap());
        assert!(!engine.enforce("member", "http:GET", "/users/42").unwrap());
    }

    #[tokio::test]
    async fn key_match2_rest_and_literals() {
        let engine = engine().await;

        assert!(engine.enforce("member", "http:POST", "/profile/avatar/large").unwrap());
        assert!(engine.enforce("member", "http:POST", "/profile/").unwrap());
        assert!(engine.enforce("auditor", "http:GET", "/reports").unwrap());
        assert!(!engine.enforce("auditor", "http:GET", "/reportsX").unwrap());
    }

    #[tokio::test]
    async fn long_unmatched_path_is_rejected_quickly() {
        let engine = PolicyEngine::new("superadmin").await.unwrap();
        engine
            .add_policy(PolicyRule::new("member", "http:GET", "/*/*/*/*/x"))
            .await
            .unwrap();

        let path = "/a".repeat(2_000);
        let started = Instant::now();
        assert!(!engine.enforce("member", "http:GET", &path).unwrap());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn role_action_and_path_must_all_match() {
        let engine = engine().await;

        assert!(engine.enforce("member", "http:GET", "/user/9").unwrap());
        assert!(engine.enforce("member", "http:PUT", "/profile/name").unwrap());
        assert!(!engine.enforce("member", "http:DELETE", "/user/9").unwrap());
        assert!(!engine.enforce("member", "http:GET", "/reports").unwrap());
        assert!(!engine.enforce("auditor", "http:GET", "/user/9").unwrap());
        assert!(!engine.enforce("nobody", "http:GET", "/user/9").unwrap());
    }

    #[tokio::test]
    async fn action_pattern_is_anchored() {
        let engine = engine().await;
        assert!(!engine.enforce("member", "http:GETALL", "/user/9").unwrap());
        assert!(!engine.enforce("member", "rpc:http:GET", "/user/9").unwrap());
    }

    #[tokio::test]
    async fn superadmin_bypasses_rules() {
        let engine = PolicyEngine::new("superadmin").await.unwrap();
        assert!(engine.enforce("superadmin", "http:DELETE", "/anything").unwrap());
        assert!(!engine.enforce("member", "http:DELETE", "/anything").unwrap());
    }

    #[tokio::test]
    async fn bad_pattern_keeps_previous_rules() {
        let engine = engine().await;
        let result = engine
            .replace_policy(vec![PolicyRule::new("member", "http:(GET", "/x")])
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidPolicy(_))));
        assert_eq!(engine.rules().unwrap().len(), 3);
        assert!(engine.enforce("member", "http:GET", "/user/9").unwrap());
    }

    #[tokio::test]
    async fn duplicate_rules_are_collapsed() {
        let engine = PolicyEngine::new("superadmin").await.unwrap();
        let rule = PolicyRule::new("member", "http:GET", "/a");

        let count = engine
            .replace_policy(vec![rule.clone(), rule.clone()])
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn add_and_clear() {
        let engine = PolicyEngine::new("superadmin").await.unwrap();
        let rule = PolicyRule::new("member", "http:GET", "/a");

        assert!(engine.add_policy(rule.clone()).await.unwrap());
        assert!(!engine.add_policy(rule).await.unwrap());
        assert!(engine.enforce("member", "http:GET", "/a").unwrap());

        engine.clear_policy().await.unwrap();
        assert!(!engine.enforce("member", "http:GET", "/a").unwrap());
        assert!(engine.rules().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exact_path_matcher() {
        let engine = PolicyEngine::with_path_matcher("superadmin", PathMatcher::Exact)
            .await
            .unwrap();
        engine
            .add_policy(PolicyRule::new("member", "http:GET", "/user/:id"))
            .await
            .unwrap();

        assert!(!engine.enforce("member", "http:GET", "/user/1").unwrap());
        assert!(engine.enforce("member", "http:GET", "/user/:id").unwrap());
    }

    #[tokio::test]
    async fn key_match3_path_matcher() {
        let engine = PolicyEngine::with_path_matcher("superadmin", PathMatcher::KeyMatch3)
            .await
            .unwrap();
        engine
            .add_policy(PolicyRule::new("member", "http:GET", "/user/{id}"))
            .await
            .unwrap();

        assert!(engine.enforce("member", "http:GET", "/user/1").unwrap());
        assert!(!engine.enforce("member", "http:GET", "/user/1/orders").unwrap());
    }

    #[test]
    fn rule_from_policy_row() {
        let rule = PolicyRule::from(&Policy {
            role: "member".to_string(),
            service_type: "http".to_string(),
            method: "GET".to_string(),
            path: "/user/:id".to_string(),
        });
        assert_eq!(rule, PolicyRule::new("member", "http:GET", "/user/:id"));
    }
}

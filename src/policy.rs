use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize as De, Serialize as Ser};

/// A `System:Group` pair naming membership in a group on a downstream system
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entitlement {
  /// System half, e.g. `GitHub`
  pub system: String,
  /// Group half, e.g. `Engineering`
  pub group: String,
}

impl Entitlement {
  /// Parse a raw `System:Group` string.
  ///
  /// The first `:` splits the halves; both must be non-empty. The group half
  /// is free text and may itself contain `:`.
  pub fn parse(raw: &str) -> Option<Entitlement> {
    raw.split_once(':')
       .filter(|(system, group)| !system.is_empty() && !group.is_empty())
       .map(|(system, group)| Entitlement { system: system.to_string(),
                                            group: group.to_string() })
  }
}

/// How bad a separation-of-duties conflict is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ser, De)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  High,
  Critical,
}

impl core::fmt::Display for Severity {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    match self {
      | Severity::High => write!(f, "high"),
      | Severity::Critical => write!(f, "critical"),
    }
  }
}

/// A separation-of-duties rule that an entitlement set violates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
  /// The entitlements that must not be held together
  pub conflicting: BTreeSet<String>,
  /// Severity of the conflict
  pub severity: Severity,
}

impl core::fmt::Display for Violation {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    let groups = self.conflicting
                     .iter()
                     .map(|s| s.as_str())
                     .collect::<Vec<_>>()
                     .join(", ");

    write!(f, "conflicting entitlements {{{}}} (severity: {})", groups, self.severity)
  }
}

#[derive(Clone, Debug)]
struct SodRule {
  conflicting_groups: BTreeSet<String>,
  severity: Severity,
}

impl SodRule {
  fn new(conflicting_groups: &[&str], severity: Severity) -> Self {
    Self { conflicting_groups: conflicting_groups.iter().map(|g| g.to_string()).collect(),
           severity }
  }
}

/// Birthright and separation-of-duties policy tables.
///
/// Every method is total, deterministic and side-effect free.
#[derive(Clone, Debug)]
pub struct Policy {
  birthright_policies: HashMap<String, Vec<String>>,
  sod_rules: Vec<SodRule>,
}

/// Entitlements granted to everyone regardless of department
const BASE_ACCESS: [&str; 3] = ["AzureAD:All Users", "Slack:general", "Slack:random"];

impl Policy {
  pub fn new() -> Self {
    let mut birthright_policies = HashMap::new();

    let mut dept = |name: &str, ents: &[&str]| {
      birthright_policies.insert(name.to_string(), ents.iter().map(|e| e.to_string()).collect());
    };

    dept("Engineering",
         &["AzureAD:Engineering", "GitHub:Engineering", "Slack:engineering"]);
    dept("Sales", &["AzureAD:Sales", "Slack:sales", "Salesforce:Users"]);
    dept("Marketing", &["AzureAD:Marketing", "Slack:marketing"]);
    dept("HR", &["AzureAD:HR", "Slack:general", "Workday:Users"]);

    let sod_rules = vec![SodRule::new(&["AzureAD:Engineering", "AzureAD:HR"], Severity::High),
                         SodRule::new(&["AzureAD:Sales", "AzureAD:Finance-Admin"], Severity::Critical)];

    Self { birthright_policies,
           sod_rules }
  }

  /// Entitlements an identity is owed purely by department membership.
  ///
  /// Unknown departments get the base set only.
  pub fn birthright(&self, department: &str) -> BTreeSet<String> {
    BASE_ACCESS.iter()
               .map(|e| e.to_string())
               .chain(self.birthright_policies
                          .get(department)
                          .into_iter()
                          .flatten()
                          .cloned())
               .collect()
  }

  /// Entitlements to remove when moving departments: anything owed by the old
  /// department that the new one does not also grant. Base access lies in
  /// both sets, so it always survives.
  pub fn revocation(&self, old_department: &str, new_department: &str) -> BTreeSet<String> {
    let old = self.birthright(old_department);
    let new = self.birthright(new_department);

    old.difference(&new).cloned().collect()
  }

  /// All SoD rules whose conflicting set is wholly contained in `entitlements`
  pub fn sod_violations(&self, entitlements: &BTreeSet<String>) -> Vec<Violation> {
    self.sod_rules
        .iter()
        .filter(|rule| rule.conflicting_groups.iter().all(|g| entitlements.contains(g)))
        .map(|rule| Violation { conflicting: rule.conflicting_groups.clone(),
                                severity: rule.severity })
        .collect()
  }
}

impl Default for Policy {
  fn default() -> Self {
    Self::new()
  }
}

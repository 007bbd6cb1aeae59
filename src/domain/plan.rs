use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::agent::{normalize, AgentKind, Resolution};

/// Planner-assessed complexity of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// How the scheduler walks the task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// One unit of work assigned to a specialist agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub agent: AgentKind,
    pub task: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Advisory only; the scheduler never orders by it
    #[serde(default)]
    pub priority: i32,
}

/// Reference from a task to the task of another agent
///
/// References the catalog cannot resolve keep their raw text and are never
/// satisfied, so the scheduler reports them as blocked instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Dependency {
    Agent(AgentKind),
    Unresolved(String),
}

impl Dependency {
    /// Resolves `raw` by exact or fuzzy match, never by defaulting
    pub fn resolve(raw: &str) -> Self {
        match normalize(raw) {
            (kind, Resolution::Exact | Resolution::Fuzzy) => Dependency::Agent(kind),
            (_, Resolution::Defaulted) => Dependency::Unresolved(raw.trim().to_string()),
        }
    }

    pub fn agent(&self) -> Option<AgentKind> {
        match self {
            Dependency::Agent(kind) => Some(*kind),
            Dependency::Unresolved(_) => None,
        }
    }
}

impl From<AgentKind> for Dependency {
    fn from(kind: AgentKind) -> Self {
        Dependency::Agent(kind)
    }
}

impl From<String> for Dependency {
    fn from(raw: String) -> Self {
        Dependency::resolve(&raw)
    }
}

impl From<Dependency> for String {
    fn from(dependency: Dependency) -> Self {
        match dependency {
            Dependency::Agent(kind) => kind.as_str().to_string(),
            Dependency::Unresolved(raw) => raw,
        }
    }
}

impl PartialEq<AgentKind> for Dependency {
    fn eq(&self, other: &AgentKind) -> bool {
        self.agent() == Some(*other)
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependency::Agent(kind) => write!(f, "{}", kind),
            Dependency::Unresolved(raw) => write!(f, "{}", raw),
        }
    }
}

/// Validated execution plan
///
/// Serializes to exactly the wire shape the planner is asked to produce, so
/// a serialized plan can be fed back through [`parse_plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub analysis: String,
    pub complexity: Complexity,
    pub agents: Vec<AgentTask>,
    pub execution: ExecutionMode,
}

impl ExecutionPlan {
    /// Agent identifiers in plan order
    pub fn agent_ids(&self) -> Vec<AgentKind> {
        self.agents.iter().map(|task| task.agent).collect()
    }

    pub fn to_wire_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Errors raised at the planner response boundary
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Orchestrator failed to create valid plan: no JSON object found in response")]
    NoJsonObject,

    #[error("Orchestrator returned malformed plan JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Orchestrator returned a plan with no agent tasks")]
    NoTasks,
}

/// A plan that passed the boundary, plus any non-fatal normalization notes
#[derive(Debug, Clone)]
pub struct ParsedPlan {
    pub plan: ExecutionPlan,
    pub warnings: Vec<String>,
}

// Untrusted shapes as the model writes them. Agent identifiers stay raw
// strings here and are only typed after normalization.
#[derive(Debug, Deserialize)]
struct RawPlan {
    analysis: String,
    complexity: Complexity,
    #[serde(default)]
    agents: Vec<RawTask>,
    execution: ExecutionMode,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    agent: String,
    task: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    dependencies: Vec<String>,
    #[serde(default, deserialize_with = "any_number")]
    priority: i32,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn any_number<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|n| n.round() as i32).unwrap_or_default())
}

/// Returns the first balanced `{...}` span in `text`
///
/// Braces inside JSON string literals are ignored, so prose or markdown
/// fences around the object are tolerated.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parses raw planner output into a typed, normalized [`ExecutionPlan`]
///
/// Unknown agent identifiers are resolved with [`normalize`]; every fallback
/// to the orchestrator is reported in [`ParsedPlan::warnings`]. Dependency
/// references resolve through [`Dependency::resolve`]; ones that match no
/// catalog agent stay unresolved and are reported as well.
pub fn parse_plan(response: &str) -> Result<ParsedPlan, PlanError> {
    let json = extract_json_object(response).ok_or(PlanError::NoJsonObject)?;
    let raw: RawPlan = serde_json::from_str(json)?;

    if raw.agents.is_empty() {
        return Err(PlanError::NoTasks);
    }

    let mut warnings = Vec::new();
    let mut resolve = |raw_id: &str| {
        let (kind, resolution) = normalize(raw_id);
        if resolution == Resolution::Defaulted {
            warnings.push(format!(
                "Invalid agent type: {}, defaulting to {}",
                raw_id,
                AgentKind::Orchestrator
            ));
        }
        kind
    };

    let mut agents = Vec::with_capacity(raw.agents.len());
    for task in raw.agents {
        let agent = resolve(&task.agent);
        let dependencies = task
            .dependencies
            .iter()
            .map(|raw_dep| Dependency::resolve(raw_dep))
            .collect();
        agents.push(AgentTask {
            agent,
            dependencies,
            task: task.task,
            priority: task.priority,
        });
    }

    for task in &agents {
        for dependency in &task.dependencies {
            if let Dependency::Unresolved(raw_dep) = dependency {
                warnings.push(format!(
                    "Unknown dependency: {} (required by {}), task will never be ready",
                    raw_dep, task.agent
                ));
            }
        }
    }

    Ok(ParsedPlan {
        plan: ExecutionPlan {
            analysis: raw.analysis,
            complexity: raw.complexity,
            agents,
            execution: raw.execution,
        },
        warnings,
    })
}

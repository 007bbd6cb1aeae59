use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifier of a specialist agent in the catalog
///
/// The set is closed: anything the planner produces is normalized onto one
/// of these variants before it reaches the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Orchestrator,
    Frontend,
    Backend,
    Devops,
    Qa,
    Database,
}

impl AgentKind {
    /// Every catalog identifier, in catalog order
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Orchestrator,
        AgentKind::Frontend,
        AgentKind::Backend,
        AgentKind::Devops,
        AgentKind::Qa,
        AgentKind::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Orchestrator => "orchestrator",
            AgentKind::Frontend => "frontend",
            AgentKind::Backend => "backend",
            AgentKind::Devops => "devops",
            AgentKind::Qa => "qa",
            AgentKind::Database => "database",
        }
    }

    /// Returns the catalog entry for this agent
    pub fn definition(&self) -> &'static AgentDefinition {
        // CATALOG is laid out in the same order as ALL
        &CATALOG[*self as usize]
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    /// Exact, case-insensitive match against catalog identifiers
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| format!("Unknown agent type: {}", s))
    }
}

/// Static role metadata for a specialist agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    pub id: AgentKind,
    pub name: &'static str,
    pub role: &'static str,
    pub system_prompt: &'static str,
    pub capabilities: &'static [&'static str],
}

static CATALOG: [AgentDefinition; 6] = [
    AgentDefinition {
        id: AgentKind::Orchestrator,
        name: "Orchestrator Agent",
        role: "Task coordinator",
        system_prompt: "You are the Orchestrator. Analyze tasks and delegate to:\n\
                        - Frontend Agent: UI/UX, React, Vue\n\
                        - Backend Agent: APIs, authentication, business logic\n\
                        - DevOps Agent: Deployment, Docker, CI/CD\n\
                        - QA Agent: Testing, code review\n\
                        - Database Agent: Schema design, queries\n\n\
                        Return a JSON plan with agent assignments.",
        capabilities: &["task_analysis", "agent_selection", "coordination"],
    },
    AgentDefinition {
        id: AgentKind::Frontend,
        name: "Frontend Specialist",
        role: "UI/UX development",
        system_prompt: "You are a Frontend Expert specializing in:\n\
                        - React, Vue, modern CSS\n\
                        - Component architecture\n\
                        - Responsive design\n\
                        - Accessibility (WCAG)\n\n\
                        Create beautiful, functional, accessible interfaces.",
        capabilities: &["react", "vue", "css", "components"],
    },
    AgentDefinition {
        id: AgentKind::Backend,
        name: "Backend Specialist",
        role: "Server-side development",
        system_prompt: "You are a Backend Expert specializing in:\n\
                        - RESTful API design\n\
                        - Authentication (JWT, OAuth)\n\
                        - Database operations\n\
                        - Business logic\n\n\
                        Build robust, secure, scalable services.",
        capabilities: &["api", "auth", "database", "logic"],
    },
    AgentDefinition {
        id: AgentKind::Devops,
        name: "DevOps Specialist",
        role: "Infrastructure & deployment",
        system_prompt: "You are a DevOps Expert specializing in:\n\
                        - Docker containerization\n\
                        - CI/CD pipelines\n\
                        - Cloud deployment (AWS, GCP)\n\
                        - Monitoring & logging\n\n\
                        Automate deployments and ensure reliability.",
        capabilities: &["docker", "cicd", "cloud", "monitoring"],
    },
    AgentDefinition {
        id: AgentKind::Qa,
        name: "QA Specialist",
        role: "Quality assurance",
        system_prompt: "You are a QA Expert specializing in:\n\
                        - Code review\n\
                        - Test generation (unit, integration, e2e)\n\
                        - Security audits\n\
                        - Performance testing\n\n\
                        Ensure quality, security, and reliability.",
        capabilities: &["review", "testing", "security", "performance"],
    },
    AgentDefinition {
        id: AgentKind::Database,
        name: "Database Specialist",
        role: "Data architecture",
        system_prompt: "You are a Database Expert specializing in:\n\
                        - Schema design\n\
                        - Query optimization\n\
                        - Indexing strategies\n\
                        - Data migrations\n\n\
                        Design efficient, scalable data storage.",
        capabilities: &["schema", "queries", "optimization", "migrations"],
    },
];

// Keyword rules only anchor the start of a word, so plurals and inflections
// ("components", "tests", "deployment") still match. `sql` is unanchored so
// NoSQL, MySQL and PostgreSQL count as database work.
static SUGGESTION_RULES: Lazy<Vec<(Regex, AgentKind)>> = Lazy::new(|| {
    [
        (r"(?i)\b(ui|ux|interface|component|react|vue|css|frontend)", AgentKind::Frontend),
        (r"(?i)\b(api|graphql|endpoint|auth|server|route|backend)", AgentKind::Backend),
        (
            r"(?i)\b(database|schema|quer|table|postgres|migration)|sql",
            AgentKind::Database,
        ),
        (
            r"(?i)\b(deploy|docker|container|pipeline|kubernetes|ci/cd)",
            AgentKind::Devops,
        ),
        (r"(?i)\b(test|review|quality|bug|security)", AgentKind::Qa),
    ]
    .into_iter()
    .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, kind)))
    .collect()
});

/// How a raw agent identifier was resolved onto the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact,
    Fuzzy,
    Defaulted,
}

/// Looks up a catalog entry by identifier (case-insensitive)
pub fn lookup(id: &str) -> Option<&'static AgentDefinition> {
    id.parse::<AgentKind>().ok().map(|kind| kind.definition())
}

/// Returns the full catalog
pub fn all() -> &'static [AgentDefinition] {
    &CATALOG
}

/// Suggests agents for a free-text request using keyword rules
///
/// Falls back to the orchestrator alone when no rule matches.
pub fn suggest(request: &str) -> Vec<AgentKind> {
    let suggested: Vec<AgentKind> = SUGGESTION_RULES
        .iter()
        .filter(|(rule, _)| rule.is_match(request))
        .map(|(_, kind)| *kind)
        .collect();

    if suggested.is_empty() {
        vec![AgentKind::Orchestrator]
    } else {
        suggested
    }
}

/// Resolves a raw identifier produced by the planner onto a catalog agent
///
/// Resolution order: exact identifier, then a catalog entry whose display name
/// contains the identifier, then a catalog identifier contained in the raw
/// string. Anything else resolves to the orchestrator. Never fails.
pub fn normalize(raw: &str) -> (AgentKind, Resolution) {
    let lowered = raw.trim().to_lowercase();

    if let Ok(kind) = lowered.parse::<AgentKind>() {
        return (kind, Resolution::Exact);
    }

    let fuzzy = CATALOG.iter().find(|definition| {
        definition.name.to_lowercase().contains(&lowered)
            || lowered.contains(definition.id.as_str())
    });

    match fuzzy {
        Some(definition) => (definition.id, Resolution::Fuzzy),
        None => (AgentKind::Orchestrator, Resolution::Defaulted),
    }
}

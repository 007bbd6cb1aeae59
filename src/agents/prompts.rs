// Prompt templates for LLM interactions
//
// This module contains all prompt templates used by the orchestration engine.
// Prompts are versioned so a logged workflow can be traced to its wording.
// System prompts are not templated; they come from the agent catalog.

use std::collections::HashMap;

/// Prompt template structure
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub user_template: String,
}

impl PromptTemplate {
    /// Render the user template with variables
    ///
    /// Each `{{key}}` is replaced by its value in a single pass, so values
    /// containing braces are inserted verbatim. Unknown placeholders are left
    /// in place.
    pub fn render(&self, variables: &HashMap<&str, String>) -> String {
        let template = self.user_template.as_str();
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            match after.find("}}") {
                Some(end) => {
                    let key = after[..end].trim();
                    match variables.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 2]),
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

pub mod library {
    use super::PromptTemplate;

    pub fn planning() -> PromptTemplate {
        PromptTemplate {
            name: "planning".to_string(),
            version: "1.0.0".to_string(),
            user_template: "Analyze this development task and create an execution plan:\n\n\
                            USER REQUEST: \"{{request}}\"\n\n\
                            CONTEXT:\n{{context}}\n\n\
                            SUGGESTED AGENTS: {{suggested}}\n\n\
                            AVAILABLE AGENTS (use these exact type names):\n{{catalog}}\n\n\
                            IMPORTANT: In your plan, use the exact agent type names in quotes above \
                            (e.g., \"database\", \"frontend\", \"backend\").\n\n\
                            Return ONLY valid JSON in this exact format:\n\
                            {\n  \
                              \"analysis\": \"brief task analysis\",\n  \
                              \"complexity\": \"simple|moderate|complex\",\n  \
                              \"agents\": [\n    {\n      \
                                \"agent\": \"agent_type\",\n      \
                                \"task\": \"specific task for this agent\",\n      \
                                \"dependencies\": [],\n      \
                                \"priority\": 1\n    }\n  ],\n  \
                              \"execution\": \"sequential|parallel\"\n\
                            }"
                .to_string(),
        }
    }

    pub fn agent_task() -> PromptTemplate {
        PromptTemplate {
            name: "agent_task".to_string(),
            version: "1.0.0".to_string(),
            user_template: "YOUR TASK: {{task}}\n\n\
                            PREVIOUS AGENT OUTPUTS:\n{{previous}}\n\n\
                            Execute your task and provide detailed output.\n\
                            Include any code, configurations, or artifacts you create."
                .to_string(),
        }
    }

    pub fn aggregation() -> PromptTemplate {
        PromptTemplate {
            name: "aggregation".to_string(),
            version: "1.0.0".to_string(),
            user_template: "Original user request: \"{{request}}\"\n\n\
                            Agent results:\n{{results}}\n\n\
                            Synthesize these results into a cohesive final response.\n\
                            Include:\n\
                            1. Summary of what was accomplished\n\
                            2. Key outputs from each agent\n\
                            3. Next steps or recommendations\n\
                            4. Any issues or warnings"
                .to_string(),
        }
    }
}

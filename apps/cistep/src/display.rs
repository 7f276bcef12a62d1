//! Output rendering for command results

use crate::error::CliError;
use cistep_types::StepResult;
use console::style;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// What a command produced, ready to render
pub enum CommandOutput {
    Description {
        name: String,
        words: Vec<String>,
    },
    Members {
        backend: String,
        groups: BTreeMap<String, Vec<String>>,
    },
    Run {
        name: String,
        codebase: String,
        branch: Option<String>,
        result: StepResult,
        description: Vec<String>,
        logs: Vec<(String, String)>,
        /// Value and the source that set it
        properties: BTreeMap<String, (Value, String)>,
    },
}

/// Output renderer for command results
pub struct OutputRenderer {
    json: bool,
    colors_enabled: bool,
}

impl OutputRenderer {
    pub fn new(json: bool, colors_enabled: bool) -> Self {
        Self {
            json,
            colors_enabled,
        }
    }

    pub fn render(&self, output: &CommandOutput) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&Self::to_json(output))?);
            return Ok(());
        }

        match output {
            CommandOutput::Description { name, words } => {
                println!("{name}");
                println!("  {}", words.join(" "));
            }
            CommandOutput::Members { backend, groups } => {
                if groups.is_empty() {
                    println!("{backend} registers no attribute groups");
                }
                for (group, members) in groups {
                    println!("{group}: {}", members.join(", "));
                }
            }
            CommandOutput::Run {
                name,
                result,
                description,
                logs,
                ..
            } => {
                println!("{name}: {}", self.result_label(*result));
                println!("  {}", description.join(" "));
                for (log, text) in logs {
                    println!("--- {log} ---");
                    print!("{text}");
                    if !text.ends_with('\n') {
                        println!();
                    }
                }
            }
        }
        Ok(())
    }

    fn result_label(&self, result: StepResult) -> String {
        if !self.colors_enabled {
            return result.to_string();
        }
        let label = style(result.as_str());
        if result.is_failure() {
            label.red().bold().to_string()
        } else if result == StepResult::Success {
            label.green().to_string()
        } else {
            label.yellow().to_string()
        }
    }

    fn to_json(output: &CommandOutput) -> Value {
        match output {
            CommandOutput::Description { name, words } => json!({
                "name": name,
                "description": words,
            }),
            CommandOutput::Members { backend, groups } => json!({
                "backend": backend,
                "groups": groups,
            }),
            CommandOutput::Run {
                name,
                codebase,
                branch,
                result,
                description,
                logs,
                properties,
            } => {
                let logs: Map<String, Value> = logs
                    .iter()
                    .map(|(log, text)| (log.clone(), Value::from(text.as_str())))
                    .collect();
                json!({
                    "name": name,
                    "codebase": codebase,
                    "branch": branch,
                    "result": result,
                    "description": description,
                    "logs": logs,
                    "properties": properties,
                })
            }
        }
    }
}

//! Typed view of a merged sweep configuration.
//!
//! ```toml
//! [config]
//! script = "ring"
//! seeds = "1001:1100"
//! basedir = "~/data/ring"
//! cluster = 5
//!
//! [parameters]
//! kappa = "0.1:0.1:0.5"
//! eta = "%(kappa)s"
//! T = 100
//!
//! [groups]
//! detuning = ["deltaC", "deltaA"]
//!
//! [averages]
//! expvals = "3,5"
//!
//! [resume]
//! continue_from = 50
//! ```
//!
//! Scalars in `[parameters]` and `[averages]` may be TOML strings, integers,
//! floats or booleans; they are converted to text before expansion. Arrays
//! in `[parameters]` are read as `;`-lists.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::TeazerError;
use crate::resume::ResumePolicy;
use crate::sweep::ParameterGroup;
use crate::utils::platform::resolve_path;

/// Keys accepted in `[config]`.
pub const CONFIG_KEYS: &[&str] = &[
    "script",
    "basename",
    "basedir",
    "seeds",
    "cluster",
    "parallel",
    "combine",
    "numericsubdirs",
    "average",
    "postprocess",
    "compress",
    "testrun_t",
    "testrun_dt",
    "tempdir",
    "queue",
    "class",
    "subset",
    "average_command",
    "continue_flag",
];

/// Keys accepted in `[resume]`.
pub const RESUME_KEYS: &[&str] =
    &["enabled", "continue_from", "require_resume", "clean_seedlist", "final_time_key"];

/// Default SGE queue.
pub const DEFAULT_QUEUE: &str = "all.q";

/// Default averaging executable.
pub const DEFAULT_AVERAGE_COMMAND: &str = "calculate_mean";

/// Default flag telling the simulation to start from a state vector.
pub const DEFAULT_CONTINUE_FLAG: &str = "--initialFileName";

/// `[resume]` settings plus the parameter holding the target final time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeSettings {
    pub policy: ResumePolicy,
    /// Parameter whose value is the target final time
    pub final_time_key: String,
}

/// A fully typed sweep configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub script: String,
    pub basename: String,
    pub basedir: PathBuf,
    /// Raw seed specification
    pub seeds: String,
    pub cluster: usize,
    pub parallel: usize,
    pub combine: bool,
    pub numeric_subdirs: bool,
    /// Submit an average stage (false when `[averages]` is empty)
    pub average: bool,
    /// Postprocess command, if any
    pub postprocess: Option<String>,
    pub compress: bool,
    pub testrun_t: f64,
    pub testrun_dt: f64,
    /// Node-local directory for simulation output
    pub tempdir: Option<PathBuf>,
    pub queue: String,
    /// Engine name
    pub class: Option<String>,
    /// Default subset expression
    pub subset: Option<String>,
    pub average_command: String,
    pub continue_flag: String,
    /// Raw parameter specifications
    pub parameters: BTreeMap<String, String>,
    /// Groups in name order
    pub groups: Vec<ParameterGroup>,
    /// Column specifications forwarded to the average command
    pub averages: BTreeMap<String, String>,
    pub resume: ResumeSettings,
}

/// Read access to one section of the merged table.
struct Section<'a> {
    name: &'static str,
    table: Option<&'a toml::Table>,
}

impl<'a> Section<'a> {
    fn of(root: &'a toml::Table, name: &'static str) -> Result<Self, TeazerError> {
        let table = match root.get(name) {
            None => None,
            Some(toml::Value::Table(t)) => Some(t),
            Some(other) => {
                return Err(TeazerError::InvalidValue {
                    key: name.to_string(),
                    raw: other.to_string(),
                    reason: "expected a [section]".to_string(),
                });
            }
        };
        Ok(Self {
            name,
            table,
        })
    }

    fn entries(&self) -> impl Iterator<Item = (&'a String, &'a toml::Value)> {
        self.table.into_iter().flat_map(|t| t.iter())
    }

    fn qualified(&self, key: &str) -> String {
        format!("{}.{key}", self.name)
    }

    fn invalid(&self, key: &str, value: &toml::Value, reason: &str) -> TeazerError {
        TeazerError::InvalidValue {
            key: self.qualified(key),
            raw: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn value(&self, key: &str) -> Option<&'a toml::Value> {
        self.table?.get(key)
    }

    fn text(&self, key: &str) -> Result<Option<String>, TeazerError> {
        self.value(key).map(|v| raw_text(v).ok_or_else(|| self.invalid(key, v, "expected a scalar"))).transpose()
    }

    fn required_text(&self, key: &str) -> Result<String, TeazerError> {
        self.text(key)?.filter(|s| !s.trim().is_empty()).ok_or_else(|| TeazerError::MissingKey {
            section: self.name.to_string(),
            key: key.to_string(),
        })
    }

    fn bool(&self, key: &str, default: bool) -> Result<bool, TeazerError> {
        let Some(value) = self.value(key) else {
            return Ok(default);
        };
        match value {
            toml::Value::Boolean(b) => Ok(*b),
            toml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, value, "expected a boolean")),
            },
            _ => Err(self.invalid(key, value, "expected a boolean")),
        }
    }

    fn count(&self, key: &str, default: usize) -> Result<usize, TeazerError> {
        let Some(value) = self.value(key) else {
            return Ok(default);
        };
        let parsed = match value {
            toml::Value::Integer(i) => usize::try_from(*i).ok(),
            toml::Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        };
        parsed
            .filter(|n| *n > 0)
            .ok_or_else(|| self.invalid(key, value, "expected a positive integer"))
    }

    fn float(&self, key: &str) -> Result<Option<f64>, TeazerError> {
        let Some(value) = self.value(key) else {
            return Ok(None);
        };
        let parsed = match value {
            toml::Value::Float(f) => Some(*f),
            toml::Value::Integer(i) => Some(*i as f64),
            toml::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| self.invalid(key, value, "expected a number"))
    }

    fn path(&self, key: &str) -> Result<Option<PathBuf>, TeazerError> {
        let Some(raw) = self.text(key)? else {
            return Ok(None);
        };
        resolve_path(&raw).map(Some).map_err(|e| TeazerError::InvalidValue {
            key: self.qualified(key),
            raw,
            reason: format!("{e:#}"),
        })
    }

    fn warn_unknown(&self, known: &[&str]) {
        for (key, _) in self.entries() {
            if known.contains(&key.as_str()) {
                continue;
            }
            let close: Vec<&str> = known
                .iter()
                .copied()
                .filter(|k| strsim::levenshtein(key, k) <= 2)
                .collect();
            if close.is_empty() {
                tracing::warn!("Ignoring unknown key '{}'", self.qualified(key));
            } else {
                tracing::warn!(
                    "Ignoring unknown key '{}' (did you mean {}?)",
                    self.qualified(key),
                    close.join(", ")
                );
            }
        }
    }
}

/// Text form of a scalar value; arrays become `;`-lists.
fn raw_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Array(items) => {
            let parts: Option<Vec<String>> = items
                .iter()
                .map(|item| match item {
                    toml::Value::Array(_) | toml::Value::Table(_) => None,
                    scalar => raw_text(scalar),
                })
                .collect();
            parts.map(|p| p.join(";"))
        }
        toml::Value::Datetime(_) | toml::Value::Table(_) => None,
    }
}

impl SweepConfig {
    /// Build the typed configuration from a merged table.
    ///
    /// # Errors
    ///
    /// - [`TeazerError::MissingKey`] for absent `script` or `seeds`
    /// - [`TeazerError::InvalidValue`] for values of the wrong type
    pub fn from_table(root: &toml::Table) -> Result<Self, TeazerError> {
        let config = Section::of(root, "config")?;
        let parameters_section = Section::of(root, "parameters")?;
        let groups_section = Section::of(root, "groups")?;
        let averages_section = Section::of(root, "averages")?;
        let resume_section = Section::of(root, "resume")?;

        config.warn_unknown(CONFIG_KEYS);
        resume_section.warn_unknown(RESUME_KEYS);

        let script = config.required_text("script")?;
        let seeds = config.required_text("seeds")?;
        let basename = match config.text("basename")? {
            Some(name) => name,
            None => std::path::Path::new(&script)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| script.clone()),
        };

        let mut parameters = BTreeMap::new();
        for (name, value) in parameters_section.entries() {
            let text = raw_text(value)
                .ok_or_else(|| parameters_section.invalid(name, value, "expected a scalar or a list"))?;
            parameters.insert(name.clone(), text);
        }

        let mut groups = Vec::new();
        for (name, value) in groups_section.entries() {
            let members: Vec<String> = match value {
                toml::Value::Array(items) => items
                    .iter()
                    .map(|m| m.as_str().map(|s| s.trim().to_string()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| groups_section.invalid(name, value, "members must be strings"))?,
                toml::Value::String(s) => {
                    s.split([';', ',']).map(str::trim).filter(|m| !m.is_empty()).map(String::from).collect()
                }
                _ => return Err(groups_section.invalid(name, value, "expected a list of parameter names")),
            };
            if members.is_empty() {
                return Err(groups_section.invalid(name, value, "group has no members"));
            }
            groups.push(ParameterGroup {
                name: name.clone(),
                members,
            });
        }

        let mut averages = BTreeMap::new();
        for (name, value) in averages_section.entries() {
            let text =
                raw_text(value).ok_or_else(|| averages_section.invalid(name, value, "expected column numbers"))?;
            averages.insert(name.clone(), text);
        }

        let mut average = config.bool("average", true)?;
        if average && averages.is_empty() {
            tracing::debug!("No [averages] configured, average stage disabled");
            average = false;
        }

        let compress = config.bool("compress", false)?;
        let resume = ResumeSettings {
            policy: ResumePolicy {
                enabled: resume_section.bool("enabled", true)?,
                continue_from: resume_section.float("continue_from")?,
                require_resume: resume_section.bool("require_resume", false)?,
                clean_seedlist: resume_section.bool("clean_seedlist", true)?,
                compress,
            },
            final_time_key: resume_section.text("final_time_key")?.unwrap_or_else(|| "T".to_string()),
        };

        Ok(Self {
            basedir: config.path("basedir")?.unwrap_or_else(|| PathBuf::from(".")),
            cluster: config.count("cluster", 1)?,
            parallel: config.count("parallel", 1)?,
            combine: config.bool("combine", true)?,
            numeric_subdirs: config.bool("numericsubdirs", false)?,
            postprocess: config.text("postprocess")?.filter(|s| !s.trim().is_empty()),
            testrun_t: config.float("testrun_t")?.unwrap_or(1.0),
            testrun_dt: config.float("testrun_dt")?.unwrap_or(0.1),
            tempdir: config.path("tempdir")?,
            queue: config.text("queue")?.unwrap_or_else(|| DEFAULT_QUEUE.to_string()),
            class: config.text("class")?,
            subset: config.text("subset")?.filter(|s| !s.trim().is_empty()),
            average_command: config
                .text("average_command")?
                .unwrap_or_else(|| DEFAULT_AVERAGE_COMMAND.to_string()),
            continue_flag: config
                .text("continue_flag")?
                .unwrap_or_else(|| DEFAULT_CONTINUE_FLAG.to_string()),
            script,
            basename,
            seeds,
            average,
            compress,
            parameters,
            groups,
            averages,
            resume,
        })
    }
}

use crate::error::{NotesError, Result};

pub struct ArgParser {
    iter: std::vec::IntoIter<String>,
    command_name: String,
}

impl ArgParser {
    pub fn new(args: Vec<String>, command_name: &str) -> Self {
        Self { iter: args.into_iter(), command_name: command_name.to_string() }
    }

    /// Extract a string value for a flag
    pub fn extract_value(&mut self, flag: &str) -> Result<String> {
        self.iter.next().ok_or_else(|| {
            NotesError::usage(format!(
                "Provide a value after {} for {}",
                flag, self.command_name
            ))
        })
    }

    /// Extract a positive count for a flag such as --limit
    pub fn extract_count(&mut self, flag: &str) -> Result<usize> {
        let raw = self.extract_value(flag)?;
        raw.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
            NotesError::usage(format!(
                "{} for {} expects a positive number, got {}",
                flag, self.command_name, raw
            ))
        })
    }

    /// Error for a flag the command does not know
    pub fn unknown(&self, flag: &str) -> NotesError {
        NotesError::usage(format!("Unknown flag for {}: {}", self.command_name, flag))
    }

    /// Get next positional argument
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<String> {
        self.iter.next()
    }

    /// Collect remaining args
    pub fn collect_remaining(self) -> Vec<String> {
        self.iter.collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Modified,
    Created,
    Title,
}

impl SortField {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "modified" | "updated" => Ok(SortField::Modified),
            "created" => Ok(SortField::Created),
            "title" => Ok(SortField::Title),
            other => Err(NotesError::usage(format!(
                "Unknown sort field: {other} (use modified|created|title)"
            ))),
        }
    }
}

/// `-x` or `--word`; text such as `- buy milk` or `-5` stays positional.
fn looks_like_flag(arg: &str) -> bool {
    arg.strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))
        .and_then(|name| name.chars().next())
        .is_some_and(|c| c.is_ascii_alphabetic())
}

/// Common flags used across multiple commands
#[derive(Default, Debug)]
pub struct CommonFlags {
    pub folder: Option<String>,
    pub account: Option<String>,
    pub relative_time: bool,
    pub sort_field: SortField,
    pub ascending: bool,
    pub limit: Option<usize>,
    pub title_only: bool,
    pub plain: bool,
    pub raw: bool,
    pub html: bool,
    pub render: bool,
    pub stdin: bool,
    pub force: bool,
    pub yes: bool,
    pub positional: Vec<String>,
}

impl CommonFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every flag any command accepts; `allowed` rejects the rest.
    pub fn parse(args: Vec<String>, command_name: &str, allowed: &[&str]) -> Result<Self> {
        let mut flags = Self::new();
        let mut parser = ArgParser::new(args, command_name);
        while let Some(arg) = parser.next() {
            if looks_like_flag(&arg) && !allowed.contains(&arg.as_str()) {
                return Err(parser.unknown(&arg));
            }
            match arg.as_str() {
                "-f" | "--folder" => flags.folder = Some(parser.extract_value(&arg)?),
                "-a" | "--account" => flags.account = Some(parser.extract_value(&arg)?),
                "--sort" => flags.sort_field = SortField::parse(&parser.extract_value(&arg)?)?,
                "--asc" => flags.ascending = true,
                "--desc" => flags.ascending = false,
                "-n" | "--limit" => flags.limit = Some(parser.extract_count(&arg)?),
                "--relative" => flags.relative_time = true,
                "--title-only" => flags.title_only = true,
                "--plain" => flags.plain = true,
                "--raw" => flags.raw = true,
                "--html" => flags.html = true,
                "--render" | "-r" => flags.render = true,
                "--stdin" => flags.stdin = true,
                "--force" => flags.force = true,
                "-y" | "--yes" => flags.yes = true,
                // everything after -- is positional
                "--" => {
                    flags.positional.extend(parser.collect_remaining());
                    break;
                }
                _ => flags.positional.push(arg),
            }
        }
        Ok(flags)
    }

    /// First positional argument, or a usage error naming the form.
    pub fn require_positional(&self, usage: &str) -> Result<&str> {
        self.positional
            .first()
            .map(String::as_str)
            .ok_or_else(|| NotesError::usage(format!("Usage: {usage}")))
    }
}

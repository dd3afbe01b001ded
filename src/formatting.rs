use chrono::{DateTime, FixedOffset};
use yansi::Paint;

use crate::note::apple_timestamp;

pub const UNKNOWN_TIME: &str = "unknown";

/// Color palette for consistent theming
pub struct ColorPalette {
    pub primary: (u8, u8, u8),   // IDs, muted text
    pub secondary: (u8, u8, u8), // Headers, emphasis
    pub timestamp: (u8, u8, u8), // Timestamps
    pub highlight: (u8, u8, u8), // Search matches
    pub folder: (u8, u8, u8),    // Folder and account names
}

impl ColorPalette {
    pub const CATPPUCCIN: Self = Self {
        primary: (108, 112, 134),   // Gray
        secondary: (148, 226, 213), // Teal
        timestamp: (137, 180, 250), // Blue
        highlight: (243, 139, 168), // Pink
        folder: (249, 226, 175),    // Yellow
    };
}

/// Formatting context passed through rendering pipeline
pub struct FormatContext {
    pub use_color: bool,
    pub palette: ColorPalette,
}

impl FormatContext {
    pub fn new(use_color: bool) -> Self {
        Self { use_color, palette: ColorPalette::CATPPUCCIN }
    }

    fn paint(&self, text: &str, rgb: (u8, u8, u8)) -> String {
        if self.use_color {
            let (r, g, b) = rgb;
            Paint::rgb(text, r, g, b).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format_id(&self, id: &str) -> String {
        self.paint(id, self.palette.primary)
    }

    pub fn format_header(&self, text: &str) -> String {
        if self.use_color {
            let (r, g, b) = self.palette.secondary;
            Paint::rgb(text, r, g, b).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format_timestamp(&self, ts: &str) -> String {
        self.paint(ts, self.palette.timestamp)
    }

    pub fn format_folder(&self, name: &str) -> String {
        self.paint(name, self.palette.folder)
    }

    pub fn highlight_match(&self, text: &str, query: Option<&str>) -> String {
        let Some(q) = query else { return text.to_string() };
        if q.is_empty() || !self.use_color {
            return text.to_string();
        }

        // Byte offsets of a lowercased copy only line up for ASCII
        let q_lower = q.to_lowercase();
        if !text.is_ascii() || !q.is_ascii() {
            return text.to_string();
        }
        let mut out = String::new();
        let mut remaining = text;

        while let Some(pos) = remaining.to_lowercase().find(&q_lower) {
            let (before, rest) = remaining.split_at(pos);
            let (matched, after) = rest.split_at(q.len().min(rest.len()));
            out.push_str(before);

            let (r, g, b) = self.palette.highlight;
            out.push_str(&Paint::rgb(matched, r, g, b).bold().to_string());

            remaining = after;
        }
        out.push_str(remaining);
        out
    }
}

/// Timestamp formatting with relative/absolute modes
pub struct TimeFormatter {
    relative_mode: bool,
    now: DateTime<FixedOffset>,
}

impl TimeFormatter {
    pub fn new(relative_mode: bool, now: DateTime<FixedOffset>) -> Self {
        Self { relative_mode, now }
    }

    /// Render a raw Core Data timestamp in `now`'s offset. Values that do not
    /// convert to a plausible date render as "unknown".
    pub fn format(&self, raw: Option<f64>) -> String {
        let Some(utc) = raw.and_then(apple_timestamp) else {
            return UNKNOWN_TIME.to_string();
        };
        let dt = utc.with_timezone(self.now.offset());
        if self.relative_mode {
            self.format_relative(dt)
        } else {
            dt.format("%Y-%m-%d %H:%M").to_string()
        }
    }

    pub fn format_relative(&self, dt: DateTime<FixedOffset>) -> String {
        let dur = self.now.signed_duration_since(dt);
        let total_minutes = dur.num_minutes().max(0);
        let total_hours = dur.num_hours().max(0);
        let total_days = dur.num_days().max(0);

        if total_hours == 0 {
            if total_minutes == 0 {
                return "just now".to_string();
            }
            return format!("{}m ago", total_minutes);
        }
        if total_days < 30 {
            if total_days == 0 {
                return format!("{}h ago", total_hours);
            }
            let hours = (total_hours - total_days * 24).max(0);
            if hours > 0 {
                format!("{}d {}h ago", total_days, hours)
            } else {
                format!("{}d ago", total_days)
            }
        } else if total_days < 365 {
            let months = total_days / 30;
            let days = total_days % 30;
            if days > 0 {
                format!("{}mo {}d ago", months, days)
            } else {
                format!("{}mo ago", months)
            }
        } else {
            let years = total_days / 365;
            let months = (total_days % 365) / 30;
            if months > 0 {
                format!("{}y {}mo ago", years, months)
            } else {
                format!("{}y ago", years)
            }
        }
    }

    pub fn format_label(&self, base: &str) -> String {
        if self.relative_mode {
            base.to_string()
        } else {
            format!("{} ({})", base, self.now.offset())
        }
    }
}

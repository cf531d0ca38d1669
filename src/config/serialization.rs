//! Config serialization to TOML
//!
//! Single source of truth for config file format. `[defaults]` is always
//! written in full; table and select sections only carry the keys that
//! differ from `[defaults]`, so re-loading the output resolves to the same
//! configuration.

use super::{Config, InstanceConfig, WidgetKind};
use serde::Serialize;

/// Writes `key = value` lines, skipping values equal to their base
struct SectionWriter {
    out: String,
    full: bool,
}

impl SectionWriter {
    fn new(full: bool) -> Self {
        Self {
            out: String::new(),
            full,
        }
    }

    fn raw(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn field<T: PartialEq>(
        &mut self,
        key: &str,
        value: &T,
        base: &T,
        render: impl Fn(&T) -> String,
    ) {
        if self.full || value != base {
            self.out.push_str(&format!("{} = {}\n", key, render(value)));
        }
    }

    /// Append as `[header]` when anything was written
    fn finish(self, header: &str, output: &mut String) {
        if !self.out.is_empty() {
            output.push_str(&format!("\n[{}]\n", header));
            output.push_str(&self.out);
        }
    }
}

fn quote(s: &String) -> String {
    toml::Value::String(s.clone()).to_string()
}

fn plain<T: ToString>(value: &T) -> String {
    value.to_string()
}

/// Inline TOML for arrays and maps
fn inline<T: Serialize>(value: &T) -> String {
    toml::Value::try_from(value)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "[]".to_string())
}

impl Config {
    /// Serialize one instance section relative to `base`
    pub(super) fn instance_to_toml(
        name: &str,
        config: &InstanceConfig,
        base: &InstanceConfig,
        full: bool,
    ) -> String {
        let mut output = String::new();

        let mut top = SectionWriter::new(full);
        if config.kind != WidgetKind::Select {
            top.field("kind", &config.kind, &base.kind, |k| {
                format!("\"{}\"", k.as_str())
            });
        }
        top.finish(name, &mut output);
        if output.is_empty() {
            output.push_str(&format!("\n[{}]\n", name));
        }

        // Ajax
        let (ajax, b) = (&config.ajax, &base.ajax);
        let mut w = SectionWriter::new(full);
        match &ajax.url {
            Some(url) => w.field("url", url, &b.url.clone().unwrap_or_default(), quote),
            None if full => w.raw("# url = \"https://example.com/api/items\""),
            None => {}
        }
        w.field("url_delimiter", &ajax.url_delimiter, &b.url_delimiter, quote);
        w.field("timeout_ms", &ajax.timeout_ms, &b.timeout_ms, plain);
        w.field(
            "reload_delay_minutes",
            &ajax.reload_delay_minutes.unwrap_or(0),
            &b.reload_delay_minutes.unwrap_or(0),
            plain,
        );
        w.field("synchronous", &ajax.synchronous, &b.synchronous, plain);
        w.field("max_retries", &ajax.max_retries, &b.max_retries, plain);
        w.field("retry_delay_ms", &ajax.retry_delay_ms, &b.retry_delay_ms, plain);
        w.field("headers", &ajax.headers, &b.headers, inline);
        w.field("log_errors", &ajax.log_errors, &b.log_errors, plain);
        w.finish(&format!("{}.ajax", name), &mut output);

        // Pagination
        let (p, b) = (&config.pagination, &base.pagination);
        let mut w = SectionWriter::new(full);
        w.field("page", &p.page, &b.page, plain);
        w.field("limit", &p.limit, &b.limit, plain);
        w.field("order", &p.order, &b.order, |o| format!("\"{}\"", o.as_str()));
        w.field("order_by", &p.order_by, &b.order_by, quote);
        w.finish(&format!("{}.pagination", name), &mut output);

        // [defaults] carries both option sets
        if full || config.kind != WidgetKind::Select {
            output.push_str(&Self::table_to_toml(name, config, base, full));
        }
        if full || config.kind == WidgetKind::Select {
            output.push_str(&Self::select_to_toml(name, config, base, full));
        }

        output
    }

    fn table_to_toml(
        name: &str,
        config: &InstanceConfig,
        base: &InstanceConfig,
        full: bool,
    ) -> String {
        let mut output = String::new();
        let (t, b) = (&config.table, &base.table);
        let mut w = SectionWriter::new(full);

        w.field("columns", &t.columns, &b.columns, inline);
        w.field("except", &t.except, &b.except, inline);
        w.field("actions", &t.actions, &b.actions, inline);
        w.field("show_numbers", &t.show_numbers, &b.show_numbers, plain);
        w.field("show_actions", &t.show_actions, &b.show_actions, plain);
        w.field("pagination_enabled", &t.pagination_enabled, &b.pagination_enabled, plain);
        w.field("search_enabled", &t.search_enabled, &b.search_enabled, plain);
        w.field("persist_history", &t.persist_history, &b.persist_history, plain);
        w.field("header_order", &t.header_order, &b.header_order, plain);
        w.field("footer", &t.footer, &b.footer, plain);
        w.field("prefix", &t.prefix, &b.prefix, quote);
        w.field("prevent_rerender", &t.prevent_rerender, &b.prevent_rerender, plain);
        w.field("num_text", &t.num_text, &b.num_text, quote);
        w.field("actions_text", &t.actions_text, &b.actions_text, quote);
        w.field("showing_text", &t.showing_text, &b.showing_text, quote);
        w.field("showing_none_text", &t.showing_none_text, &b.showing_none_text, quote);
        w.field("response_mode", &t.response_mode, &b.response_mode, |m| {
            format!("\"{}\"", m.as_str())
        });
        w.field("max_middle", &t.window.max_middle, &b.window.max_middle, plain);
        w.field(
            "early_ellipsis_threshold",
            &t.window.early_ellipsis_threshold,
            &b.window.early_ellipsis_threshold,
            plain,
        );
        w.field(
            "late_ellipsis_gap",
            &t.window.late_ellipsis_gap,
            &b.window.late_ellipsis_gap,
            plain,
        );
        w.finish(&format!("{}.table", name), &mut output);

        output
    }

    fn select_to_toml(
        name: &str,
        config: &InstanceConfig,
        base: &InstanceConfig,
        full: bool,
    ) -> String {
        let mut output = String::new();
        let (s, b) = (&config.select, &base.select);
        let mut w = SectionWriter::new(full);

        w.field("value_field", &s.value_field, &b.value_field, quote);
        w.field("label_field", &s.label_field, &b.label_field, quote);
        if let Some(selected) = &s.selected_value {
            w.field("selected_value", selected, &String::new(), quote);
        }
        if let Some(default_option) = &s.default_option {
            w.field("default_option", default_option, &String::new(), quote);
        }
        w.finish(&format!("{}.select", name), &mut output);

        output
    }

    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        let mut output = format!(
            r#"# jsontable configuration

# Seconds between poll timer ticks
tick_secs = {tick_secs}

# Where pagination history is kept
state_dir = {state_dir}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level}
# File logging (in addition to the TUI log panel or stderr)
file_enabled = {log_file_enabled}
file_dir = {log_file_dir}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix}

# ─────────────────────────────────────────────────────────────────────────────
# DEFAULTS
# ─────────────────────────────────────────────────────────────────────────────
# Options every [tables.X] and [selects.X] section starts from.
# reload_delay_minutes = 0 disables polling.
"#,
            tick_secs = self.tick_secs,
            state_dir = quote(&self.state_dir.display().to_string()),
            log_level = quote(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = quote(&self.logging.file_dir.display().to_string()),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = quote(&self.logging.file_prefix),
        );

        output.push_str(&Self::instance_to_toml(
            "defaults",
            &self.defaults,
            &InstanceConfig::default(),
            true,
        ));

        output.push_str(
            r#"
# ─────────────────────────────────────────────────────────────────────────────
# TABLES AND SELECTS
# ─────────────────────────────────────────────────────────────────────────────
"#,
        );

        if self.tables.is_empty() && self.selects.is_empty() {
            output.push_str(
                r#"
# [tables.users]
# url = "https://example.com/api/users"
# [tables.users.table]
# except = ["password_hash"]
# columns = [{ field = "name" }, { field = "email", title = "E-mail" }]
#
# [selects.roles]
# url = "https://example.com/api/roles"
# [selects.roles.select]
# label_field = "title"
"#,
            );
        }

        for (id, config) in &self.tables {
            output.push_str(&Self::instance_to_toml(
                &format!("tables.{}", id),
                config,
                &self.defaults,
                false,
            ));
        }

        let mut defaults_as_select = self.defaults.clone();
        defaults_as_select.kind = WidgetKind::Select;
        defaults_as_select.ajax.reload_delay_minutes = None;
        for (id, config) in &self.selects {
            output.push_str(&Self::instance_to_toml(
                &format!("selects.{}", id),
                config,
                &defaults_as_select,
                false,
            ));
        }

        output
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config path",
            ));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, self.to_toml())
    }
}

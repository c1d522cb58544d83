use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use alterego_config::AppConfig;
use alterego_llm::{AgentSetting, Provider};
use alterego_memory::Dimension;
use alterego_runtime::{
    DEFAULT_BUS_CAPACITY, Event, EventBus, HandleReport, PersonaUpdate, Services, Subscription,
};

#[derive(Debug, Clone, Default, Args)]
pub(crate) struct SettingArgs {
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,
    #[arg(long)]
    pub disable: bool,
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    /// Pass an empty string to clear.
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Apply command-line overrides on top of the stored setting.
pub(crate) fn apply_setting_args(mut setting: AgentSetting, args: &SettingArgs) -> AgentSetting {
    if args.enable {
        setting.enable = true;
    }
    if args.disable {
        setting.enable = false;
    }
    if let Some(provider) = &args.provider {
        setting.provider = provider.trim().to_string();
    }
    if let Some(model) = &args.model {
        setting.model = model.trim().to_string();
    }
    if let Some(api_key) = &args.api_key {
        setting.api_key = api_key.clone();
    }
    if let Some(base_url) = &args.base_url {
        setting.base_url = base_url.trim().to_string();
    }
    setting
}

pub(crate) fn redacted_setting(setting: &AgentSetting) -> Value {
    json!({
        "enable": setting.enable,
        "provider": setting.provider,
        "model": setting.model,
        "apiKey": if setting.api_key.is_empty() { "" } else { "********" },
        "baseURL": setting.base_url,
    })
}

pub(crate) fn describe_report(report: &HandleReport) -> String {
    let cache = if report.cache_invalidated {
        "cache cleared"
    } else {
        "cache NOT cleared"
    };
    match &report.update {
        PersonaUpdate::Updated {
            dimension,
            features,
        } => {
            let list = features
                .iter()
                .map(|f| format!("{}={:.2}", f.name, f.weight))
                .collect::<Vec<_>>()
                .join(", ");
            format!("updated {dimension}: [{list}] ({cache})")
        }
        PersonaUpdate::Skipped(reason) => format!("skipped: {reason} ({cache})"),
        PersonaUpdate::Failed(err) => format!("failed [{}]: {err} ({cache})", err.kind()),
    }
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

// ── setting ───────────────────────────────────────────────────────────────────

pub(crate) fn run_setting_show(services: &Services) -> Result<()> {
    match services.settings.load()? {
        Some(setting) => println!("{}", serde_json::to_string_pretty(&redacted_setting(&setting))?),
        None => println!("no agent setting stored (agent disabled)"),
    }
    Ok(())
}

pub(crate) fn run_setting_set(services: &Services, args: &SettingArgs) -> Result<()> {
    let current = services.settings.load()?.unwrap_or_default();
    let next = apply_setting_args(current, args);
    if !next.provider.is_empty() && Provider::parse(&next.provider).is_none() {
        bail!(
            "unknown provider '{}' (expected one of: {})",
            next.provider,
            Provider::ALL.map(|p| p.as_str()).join(", ")
        );
    }
    services.settings.save(&next)?;
    println!("setting saved");
    println!("{}", serde_json::to_string_pretty(&redacted_setting(&next))?);
    Ok(())
}

// ── persona ───────────────────────────────────────────────────────────────────

pub(crate) fn run_persona_show(services: &Services) -> Result<()> {
    match services.engine.repository().load()? {
        Some(persona) => println!("{}", serde_json::to_string_pretty(&persona)?),
        None => println!("no persona yet; ingest some content first"),
    }
    Ok(())
}

// ── ingest / watch ────────────────────────────────────────────────────────────

pub(crate) async fn run_ingest(services: &Services, text: &str, stream: bool) -> Result<()> {
    let item = services
        .content
        .append(text, Utc::now().timestamp())
        .context("failed to record content")?;
    let event = Event::content_created(&item);

    let report = if stream {
        let (tx, mut rx) = mpsc::channel::<String>(32);
        let printer = tokio::spawn(async move {
            let mut stdout = std::io::stdout();
            while let Some(chunk) = rx.recv().await {
                let _ = write!(stdout, "{chunk}");
                let _ = stdout.flush();
            }
        });
        let report = services.handler.handle_streaming(&event, tx).await;
        printer.await.ok();
        println!();
        report
    } else {
        services.handler.handle(&event).await
    };
    println!("{}", describe_report(&report));
    Ok(())
}

pub(crate) async fn run_watch(services: &Services) -> Result<()> {
    let (bus, subscription) = EventBus::spawn(services.handler.clone(), DEFAULT_BUS_CAPACITY);
    let Subscription { mut reports, task } = subscription;
    let printer = tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            println!("{}", describe_report(&report));
        }
    });

    eprintln!("reading content from stdin, one item per line (Ctrl-D to stop)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let item = services.content.append(text, Utc::now().timestamp())?;
        bus.publish(Event::content_created(&item)).await?;
    }

    drop(bus);
    let handled = task.await.context("event bus task panicked")?;
    printer.await.ok();
    eprintln!("{handled} events handled");
    Ok(())
}

// ── recent / doctor ───────────────────────────────────────────────────────────

pub(crate) async fn run_recent(services: &Services) -> Result<()> {
    let summary = services
        .summarizer
        .recent_summary()
        .await
        .context("failed to build recent summary")?;
    println!("{summary}");
    Ok(())
}

pub(crate) fn run_doctor(
    config: &AppConfig,
    config_path: &str,
    config_exists: bool,
    services: &Services,
) -> Result<()> {
    println!("alterego doctor");
    println!(
        "- config: {config_path}{}",
        if config_exists { "" } else { " (missing, using defaults)" }
    );
    println!("- store: {}", config.store.path);
    println!("- selector: {:?}", config.persona.selector);
    println!("- request timeout: {:?}", config.request_timeout());

    match services.settings.load() {
        Ok(Some(setting)) => {
            println!("- agent enabled: {}", setting.enable);
            let provider = match Provider::parse(&setting.provider) {
                Some(p) => p.to_string(),
                None if setting.provider.is_empty() => "(not set)".to_string(),
                None => format!("{} (unknown)", setting.provider),
            };
            println!("- provider: {provider}");
            println!(
                "- model: {}",
                if setting.model.is_empty() { "(not set)" } else { setting.model.as_str() }
            );
            println!("- api key: {}", if setting.api_key.is_empty() { "missing" } else { "set" });
        }
        Ok(None) => println!("- agent setting: not stored (disabled)"),
        Err(err) => println!("- agent setting: unreadable ({err})"),
    }

    match services.engine.repository().load() {
        Ok(Some(persona)) => {
            println!("- persona: {} (updated {})", persona.name, format_timestamp(persona.updated_at));
            for dim in Dimension::ALL {
                println!("    {dim:<10} {} features", persona.features(dim).len());
            }
        }
        Ok(None) => println!("- persona: not created yet"),
        Err(err) => println!("- persona: unreadable ({err})"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alterego_memory::Feature;
    use alterego_runtime::{EngineError, SkipReason};

    use super::*;

    #[test]
    fn setting_args_override_only_given_fields() {
        let base = AgentSetting {
            enable: false,
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            api_key: "sk-old".into(),
            base_url: "https://proxy.local/v1".into(),
        };
        let args = SettingArgs {
            enable: true,
            model: Some(" deepseek-chat ".into()),
            base_url: Some(String::new()),
            ..SettingArgs::default()
        };
        let next = apply_setting_args(base, &args);
        assert!(next.enable);
        assert_eq!(next.provider, "openai");
        assert_eq!(next.model, "deepseek-chat");
        assert_eq!(next.api_key, "sk-old");
        assert!(next.base_url.is_empty());
    }

    #[test]
    fn redacted_setting_hides_key() {
        let setting = AgentSetting {
            api_key: "sk-secret".into(),
            ..AgentSetting::default()
        };
        let shown = redacted_setting(&setting).to_string();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn describes_each_outcome() {
        let updated = HandleReport {
            cache_invalidated: true,
            update: PersonaUpdate::Updated {
                dimension: Dimension::Topics,
                features: vec![Feature::new("编程", 0.9)],
            },
        };
        assert_eq!(describe_report(&updated), "updated topics: [编程=0.90] (cache cleared)");

        let skipped = HandleReport {
            cache_invalidated: false,
            update: PersonaUpdate::Skipped(SkipReason::Disabled),
        };
        assert_eq!(
            describe_report(&skipped),
            "skipped: agent disabled (cache NOT cleared)"
        );

        let failed = HandleReport {
            cache_invalidated: true,
            update: PersonaUpdate::Failed(EngineError::Timeout(std::time::Duration::from_secs(5))),
        };
        assert!(describe_report(&failed).starts_with("failed [timeout]"));
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
    }
}

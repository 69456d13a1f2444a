//! `tiller models` — list configured providers and models.

use std::path::PathBuf;

use tiller_config::AppConfig;

pub fn run(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(&super::config_path(path))?;
    print!("{}", listing(&config));
    Ok(())
}

fn listing(config: &AppConfig) -> String {
    let selected = config.default_selection().ok();
    let mut out = String::new();

    for provider in &config.providers {
        let credentials = match (&provider.api_key_env, &provider.api_key) {
            (Some(env), None) => format!(", {env} not set"),
            _ => String::new(),
        };
        out.push_str(&format!(
            "{} ({}, {}{credentials})\n",
            provider.name,
            provider.kind.as_str(),
            provider.base_url()
        ));

        for model in &provider.models {
            let current = selected
                .as_ref()
                .is_some_and(|(p, m)| *p == provider.name && *m == model.name);
            out.push_str(&format!("  {} {}", if current { '*' } else { '-' }, model.name));
            if let Some(short) = &model.short_name {
                out.push_str(&format!(" ({short})"));
            }
            out.push_str(&format!(" [context {}]\n", model.context_size));
        }
    }
    out
}

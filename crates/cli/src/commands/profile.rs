//! CLI handler for the `profile` command.

use super::emit;
use crate::app::Services;
use crate::cli::OutputFormat;
use anyhow::Result;
use dailypaper_state::{PaperQueries, UserProfile};

/// Blank strings clear a field.
fn field(value: Option<String>, current: Option<String>) -> Option<String> {
    match value {
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v.trim().to_string()),
        None => current,
    }
}

/// Handle the `profile` command. Without flags the profile is only shown.
pub(crate) fn handle_profile_command(
    services: &Services,
    interested: Option<String>,
    disinterested: Option<String>,
    description: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let current = services.store.user_profile()?.unwrap_or_default();
    let profile = if interested.is_none() && disinterested.is_none() && description.is_none() {
        current
    } else {
        let updated = UserProfile {
            interested_keywords: field(interested, current.interested_keywords),
            disinterested_keywords: field(disinterested, current.disinterested_keywords),
            interest_description: field(description, current.interest_description),
        };
        services.store.save_user_profile(&updated)?;
        tracing::info!("profile updated");
        updated
    };

    emit(format, &profile, |p| {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".into());
        println!("Interested:    {}", show(&p.interested_keywords));
        println!("Disinterested: {}", show(&p.disinterested_keywords));
        println!("Description:   {}", show(&p.interest_description));
    })
}

#[cfg(test)]
mod tests {
    use super::field;

    #[test]
    fn blank_values_clear_and_missing_values_keep() {
        assert_eq!(field(Some("  ".into()), Some("old".into())), None);
        assert_eq!(field(None, Some("old".into())), Some("old".into()));
        assert_eq!(field(Some(" gnn ".into()), None), Some("gnn".into()));
    }
}

//! Configuration validation utilities.

use std::collections::HashSet;

use sprocket_core::SkillConfig;

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatchConfig, LogOutput, LoggingConfig, SprocketConfig, WebConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SprocketConfig) -> ConfigResult<()> {
    validate_logging(&config.logging)?;
    validate_dispatch(&config.dispatch)?;
    validate_web(&config.web)?;
    validate_skills(&config.skills)?;
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.handler_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Handler timeout must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_web(web: &WebConfig) -> ConfigResult<()> {
    if !web.enabled {
        return Ok(());
    }
    if web.host.is_empty() {
        return Err(ConfigError::missing_field("web.host"));
    }
    validate_port(web.port)
}

fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

fn validate_skills(skills: &[SkillConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for skill in skills {
        if skill.name.is_empty() {
            return Err(ConfigError::missing_field("skills.name"));
        }
        if !seen.insert(skill.name.as_str()) {
            return Err(ConfigError::DuplicateSkill(skill.name.clone()));
        }
        if let Some(value) = skill.option("timeout_ms")
            && value.as_u64().is_none_or(|ms| ms == 0)
        {
            return Err(ConfigError::validation(format!(
                "skills.{}.timeout_ms must be a positive integer, got {value}",
                skill.name
            )));
        }
    }

    Ok(())
}

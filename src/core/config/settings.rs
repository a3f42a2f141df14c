use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_u16,
    parse_u32, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings,
    MuxSettings, RedisSettings, ReviewSettings, RuntimeSettings, SecuritySettings, ServerHost,
    ServerPort, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("WEBDOJO_HOST", "0.0.0.0");
        let port = env_or_default("WEBDOJO_PORT", "8000");

        let environment =
            parse_environment(env_optional("WEBDOJO_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("WEBDOJO_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "WebDojo API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "60"),
        )?;
        let refresh_token_expire_minutes = parse_u64(
            "REFRESH_TOKEN_EXPIRE_MINUTES",
            env_or_default("REFRESH_TOKEN_EXPIRE_MINUTES", "20160"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "webdojo");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "webdojo_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let openai_api_key = env_or_default("OPENAI_API_KEY", "");
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "");
        let ai_model = env_or_default("AI_MODEL", "gpt-4o-mini");
        let ai_max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "2000"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "120"))?;

        let mux_token_id = env_or_default("MUX_TOKEN_ID", "");
        let mux_token_secret = env_or_default("MUX_TOKEN_SECRET", "");
        let mux_webhook_secret = env_or_default("MUX_WEBHOOK_SECRET", "");
        let mux_api_base_url = env_or_default("MUX_API_BASE_URL", "https://api.mux.com");
        let mux_playback_base_url =
            env_or_default("MUX_PLAYBACK_BASE_URL", "https://stream.mux.com");

        let review_max_job_attempts = parse_u32(
            "REVIEW_MAX_JOB_ATTEMPTS",
            env_or_default("REVIEW_MAX_JOB_ATTEMPTS", "3"),
        )?;
        let review_worker_poll_seconds = parse_u64(
            "REVIEW_WORKER_POLL_SECONDS",
            env_or_default("REVIEW_WORKER_POLL_SECONDS", "2"),
        )?;
        let review_worker_concurrency = parse_u64(
            "REVIEW_WORKER_CONCURRENCY",
            env_or_default("REVIEW_WORKER_CONCURRENCY", "2"),
        )? as usize;

        let first_superuser_username = env_or_default("FIRST_SUPERUSER_USERNAME", "admin");
        let first_superuser_email =
            env_or_default("FIRST_SUPERUSER_EMAIL", "admin@webdojo.local");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("WEBDOJO_LOG_LEVEL", "info");
        let json = env_optional("WEBDOJO_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled = env_optional("PROMETHEUS_ENABLED")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings {
                secret_key,
                access_token_expire_minutes,
                refresh_token_expire_minutes,
                algorithm,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                openai_api_key,
                openai_base_url,
                ai_model,
                ai_max_tokens,
                ai_request_timeout,
            },
            mux: MuxSettings {
                token_id: mux_token_id,
                token_secret: mux_token_secret,
                webhook_secret: mux_webhook_secret,
                api_base_url: mux_api_base_url,
                playback_base_url: mux_playback_base_url,
            },
            review: ReviewSettings {
                max_job_attempts: review_max_job_attempts,
                worker_poll_seconds: review_worker_poll_seconds,
                worker_concurrency: review_worker_concurrency,
            },
            admin: AdminSettings {
                first_superuser_username,
                first_superuser_email,
                first_superuser_password,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn mux(&self) -> &MuxSettings {
        &self.mux
    }

    pub(crate) fn review(&self) -> &ReviewSettings {
        &self.review
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.review.max_job_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "REVIEW_MAX_JOB_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.review.worker_poll_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "REVIEW_WORKER_POLL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.review.worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "REVIEW_WORKER_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if self.ai.openai_base_url.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_BASE_URL"));
        }
        if self.mux.token_id.is_empty() || self.mux.token_secret.is_empty() {
            return Err(ConfigError::MissingSecret("MUX_TOKEN_ID/MUX_TOKEN_SECRET"));
        }
        if self.mux.webhook_secret.is_empty() {
            return Err(ConfigError::MissingSecret("MUX_WEBHOOK_SECRET"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn defaults_load_in_dev() {
        let _guard = crate::test_support::env_lock();
        crate::test_support::clear_config_env();
        std::env::set_var("SECRET_KEY", "test-secret");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.server_port(), 8000);
        assert_eq!(settings.api().api_v1_str, "/api/v1");
        assert_eq!(settings.review().max_job_attempts, 3);
    }

    #[test]
    fn strict_config_requires_secrets() {
        let _guard = crate::test_support::env_lock();
        crate::test_support::clear_config_env();
        std::env::set_var("SECRET_KEY", "test-secret");
        std::env::set_var("WEBDOJO_STRICT_CONFIG", "1");

        let result = Settings::load();
        assert!(result.is_err(), "strict config must fail without secrets");

        std::env::remove_var("WEBDOJO_STRICT_CONFIG");
    }
}

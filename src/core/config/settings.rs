use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_i32,
    parse_u16, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExamSettings,
    ProctoringSettings, RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort,
    ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EXAMLY_HOST", "0.0.0.0");
        let port = env_or_default("EXAMLY_PORT", "8000");

        let environment =
            parse_environment(env_optional("EXAMLY_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EXAMLY_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Examly API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "examlysuperuser");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "examly_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let stale_attempt_hours =
            parse_u64("STALE_ATTEMPT_HOURS", env_or_default("STALE_ATTEMPT_HOURS", "24"))?;
        let sweep_interval_seconds =
            parse_u64("SWEEP_INTERVAL_SECONDS", env_or_default("SWEEP_INTERVAL_SECONDS", "300"))?;
        let derivation_poll_seconds = parse_u64(
            "DERIVATION_POLL_SECONDS",
            env_or_default("DERIVATION_POLL_SECONDS", "2"),
        )?;
        let top_scorers_cache_seconds = parse_u64(
            "TOP_SCORERS_CACHE_SECONDS",
            env_or_default("TOP_SCORERS_CACHE_SECONDS", "60"),
        )?;

        let suspicious_tab_switches = parse_i32(
            "SUSPICIOUS_TAB_SWITCHES",
            env_or_default("SUSPICIOUS_TAB_SWITCHES", "5"),
        )?;
        let suspicious_webcam_violations = parse_i32(
            "SUSPICIOUS_WEBCAM_VIOLATIONS",
            env_or_default("SUSPICIOUS_WEBCAM_VIOLATIONS", "3"),
        )?;
        let event_rate_limit =
            parse_u64("PROCTORING_EVENT_LIMIT", env_or_default("PROCTORING_EVENT_LIMIT", "30"))?;
        let event_rate_window_seconds = parse_u64(
            "PROCTORING_EVENT_WINDOW_SECONDS",
            env_or_default("PROCTORING_EVENT_WINDOW_SECONDS", "60"),
        )?;

        let first_superuser_username = env_or_default("FIRST_SUPERUSER_USERNAME", "admin");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("EXAMLY_LOG_LEVEL", "info");
        let json = env_optional("EXAMLY_LOG_JSON")
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
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
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
            exam: ExamSettings {
                stale_attempt_hours,
                sweep_interval_seconds,
                derivation_poll_seconds,
                top_scorers_cache_seconds,
            },
            proctoring: ProctoringSettings {
                suspicious_tab_switches,
                suspicious_webcam_violations,
                event_rate_limit,
                event_rate_window_seconds,
            },
            admin: AdminSettings { first_superuser_username, first_superuser_password },
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

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn proctoring(&self) -> &ProctoringSettings {
        &self.proctoring
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
        if self.exam.stale_attempt_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "STALE_ATTEMPT_HOURS",
                value: "0".to_string(),
            });
        }

        if self.exam.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.exam.derivation_poll_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DERIVATION_POLL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.proctoring.event_rate_window_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "PROCTORING_EVENT_WINDOW_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.proctoring.suspicious_tab_switches < 0
            || self.proctoring.suspicious_webcam_violations < 0
        {
            return Err(ConfigError::InvalidValue {
                field: "SUSPICIOUS_TAB_SWITCHES/SUSPICIOUS_WEBCAM_VIOLATIONS",
                value: "negative".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }

        Ok(())
    }
}

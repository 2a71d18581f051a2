use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, ExportSettings, RuntimeSettings, ServerHost,
    ServerPort, ServerSettings, Settings, SupabaseSettings, TelemetrySettings, TestStoreSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("TRYOUT_HOST", "0.0.0.0");
        let port = env_or_default("TRYOUT_PORT", "8000");

        let environment =
            parse_environment(env_optional("TRYOUT_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("TRYOUT_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "IELTS Tryout API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_prefix = env_or_default("API_PREFIX", "/api");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let tests_root = env_or_default("TESTS_ROOT", "tests");
        let default_test_id = env_or_default("DEFAULT_TEST_ID", "ielts_tryout_1");

        let supabase_url = env_or_default("SUPABASE_URL", "");
        let supabase_service_role_key = env_or_default("SUPABASE_SERVICE_ROLE_KEY", "");
        let supabase_timeout_seconds = parse_u64(
            "SUPABASE_TIMEOUT_SECONDS",
            env_or_default("SUPABASE_TIMEOUT_SECONDS", "10"),
        )?;

        let export_path = env_or_default("RESULTS_EXPORT_PATH", "exports/submissions.csv");

        let log_level = env_or_default("TRYOUT_LOG_LEVEL", "info");
        let json = env_optional("TRYOUT_LOG_JSON")
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
            api: ApiSettings { project_name, version, api_prefix },
            cors: CorsSettings { origins: cors_origins },
            tests: TestStoreSettings { root: tests_root, default_test_id },
            supabase: SupabaseSettings {
                url: supabase_url,
                service_role_key: supabase_service_role_key,
                timeout_seconds: supabase_timeout_seconds,
            },
            export: ExportSettings { path: export_path },
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

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn tests(&self) -> &TestStoreSettings {
        &self.tests
    }

    pub(crate) fn supabase(&self) -> &SupabaseSettings {
        &self.supabase
    }

    pub(crate) fn export(&self) -> &ExportSettings {
        &self.export
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.supabase.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SUPABASE_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.export.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "RESULTS_EXPORT_PATH",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        let tests_root = std::path::Path::new(&self.tests.root);
        if !tests_root.exists() || !tests_root.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "TESTS_ROOT",
                value: self.tests.root.clone(),
            });
        }

        if self.supabase.url.is_empty() != self.supabase.service_role_key.is_empty() {
            return Err(ConfigError::MissingSecret("SUPABASE_URL/SUPABASE_SERVICE_ROLE_KEY"));
        }

        Ok(())
    }
}

#![allow(dead_code)]

pub mod fixtures {
    use brrtdispatch::spec::{load_registry, MetadataResolver};
    use brrtdispatch::ServiceRegistry;
    use std::path::PathBuf;
    use std::sync::Arc;

    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    /// The shared `services.yaml` fixture, resolved with the default resolver.
    pub fn services_registry() -> Arc<ServiceRegistry> {
        let registry = load_registry(fixture_path("services.yaml"), &MetadataResolver::new())
            .expect("fixture resolves");
        Arc::new(registry)
    }
}

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a temporary file with the given extension. The file
    /// is removed when the handle drops.
    pub fn create_temp_spec(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("brrtd_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file.flush().expect("flush temp file");
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_spec(content, "yaml")
    }

    pub fn create_temp_json(content: &str) -> NamedTempFile {
        create_temp_spec(content, "json")
    }
}

pub mod logs {
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::subscriber::DefaultGuard;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Captures everything logged on the current thread while alive.
    pub struct CapturedLogs {
        buf: SharedBuf,
        _guard: DefaultGuard,
    }

    impl CapturedLogs {
        pub fn start() -> Self {
            let buf = SharedBuf::default();
            let writer = buf.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::TRACE)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            let guard = tracing::subscriber::set_default(subscriber);
            CapturedLogs { buf, _guard: guard }
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.buf.0.lock().expect("log buffer")).into_owned()
        }
    }
}

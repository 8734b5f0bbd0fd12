use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use dhcpconf::engine::{CHECK_ONLY_MESSAGE, SUCCESS_MESSAGE};
use dhcpconf::error::{STATUS_COMMIT_FAILED, STATUS_VALIDATION_FAILED};
use dhcpconf::parsers::Dispatch;
use dhcpconf::{
    CommandChannel, ConfigEngine, ConfigNode, ConfigParser, Error, HookLibraryLoader, HooksConfig,
    ParserRegistry, Result, SocketDescriptor, SrvConfig, ValidationError,
};

const PASS: u8 = 0;
const FAIL: u8 = 1;
const PANIC: u8 = 2;

/// Delegates to the real parser for `key` until told to fail or panic.
struct Switchable {
    key: String,
    real: ParserRegistry,
    mode: Arc<AtomicU8>,
}

impl ConfigParser for Switchable {
    fn parse(
        &self,
        node: &ConfigNode,
        staged: &mut SrvConfig,
    ) -> std::result::Result<(), ValidationError> {
        match self.mode.load(Ordering::SeqCst) {
            FAIL => Err(ValidationError::invalid(
                format!("injected failure for '{}'", self.key),
                node.position(),
            )),
            PANIC => panic!("injected panic for '{}'", self.key),
            _ => match self.real.lookup(&self.key) {
                Dispatch::Parse(parser) => parser.parse(node, staged),
                _ => Ok(()),
            },
        }
    }
}

#[derive(Clone, Default)]
struct RecordingChannel {
    calls: Arc<Mutex<Vec<String>>>,
    fail_open: bool,
}

impl RecordingChannel {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl CommandChannel for RecordingChannel {
    fn open(&mut self, descriptor: &SocketDescriptor) -> Result<()> {
        if self.fail_open {
            return Err(Error::Commit(format!(
                "failed to open command socket {}",
                descriptor.socket_name
            )));
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("open {}", descriptor.socket_name));
        Ok(())
    }

    fn close(&mut self) {
        self.calls.lock().unwrap().push("close".to_string());
    }
}

#[derive(Clone, Default)]
struct RecordingLoader {
    loaded: Arc<Mutex<Vec<String>>>,
    reject: bool,
    fail_load: bool,
}

impl HookLibraryLoader for RecordingLoader {
    fn validate(&self, hooks: &HooksConfig) -> Result<()> {
        if self.reject && !hooks.is_empty() {
            return Err(Error::Validation(ValidationError::invalid(
                "hooks libraries failed to validate",
                hooks.libraries()[0].position,
            )));
        }
        Ok(())
    }

    fn load(&mut self, hooks: &HooksConfig) -> Result<()> {
        if self.fail_load {
            return Err(Error::Commit("failed to load hook library".to_string()));
        }
        let mut loaded = self.loaded.lock().unwrap();
        loaded.clear();
        loaded.extend(hooks.paths().map(|path| path.display().to_string()));
        Ok(())
    }
}

fn full_document(valid_lifetime: u32) -> ConfigNode {
    ConfigNode::from(serde_json::json!({
        "option-def": [{ "name": "foo", "code": 1000, "type": "uint16", "space": "isc" }],
        "option-data": [
            { "name": "dns-servers", "data": "2001:db8::1, 2001:db8::2" },
            { "name": "foo", "space": "isc", "data": "12" }
        ],
        "mac-sources": ["duid", "ipv6-link-local"],
        "control-socket": { "socket-type": "unix", "socket-name": "/tmp/dhcpconf-test.sock" },
        "host-reservation-identifiers": ["duid", "hw-address"],
        "server-id": { "type": "EN", "enterprise-id": 2495, "identifier": "0102" },
        "interfaces-config": { "interfaces": ["eth0"] },
        "expired-leases-processing": { "max-reclaim-leases": 50 },
        "hooks-libraries": [{ "library": "/usr/lib/libdhcp_test.so" }],
        "dhcp-ddns": { "enable-updates": false },
        "client-classes": [{ "name": "lab", "test": "member('ALL')" }],
        "lease-database": { "type": "memfile", "lfc-interval": 3600 },
        "hosts-database": { "type": "mysql", "name": "kea" },
        "subnet6": [
            { "subnet": "2001:db8:1::/64", "pools": [{ "pool": "2001:db8:1::10-2001:db8:1::ff" }] },
            { "subnet": "2001:db8:2::/64", "valid-lifetime": 600 },
            { "subnet": "2001:db8:3::/64" }
        ],
        "relay-supplied-options": ["dns-servers", "1027"],
        "renew-timer": 1000,
        "rebind-timer": 2000,
        "preferred-lifetime": 3000,
        "valid-lifetime": valid_lifetime,
        "decline-probation-period": 600,
        "dhcp4o6-port": 6767
    }))
}

fn engine(channel: RecordingChannel, loader: RecordingLoader) -> ConfigEngine {
    ConfigEngine::new(Box::new(channel), Box::new(loader))
}

fn snapshot(engine: &ConfigEngine) -> String {
    serde_json::to_string(engine.current().as_ref()).unwrap()
}

#[test]
fn test_full_document_loads() {
    let loader = RecordingLoader::default();
    let mut engine = engine(RecordingChannel::default(), loader.clone());
    let answer = engine.configure(&full_document(4000), false);
    assert_eq!(answer.code, 0, "{}", answer.message);
    assert_eq!(answer.message, SUCCESS_MESSAGE);

    let current = engine.current();
    assert_eq!(current.subnets.len(), 3);
    assert_eq!(current.subnets[0].valid_lifetime, 4000);
    assert_eq!(current.subnets[1].valid_lifetime, 600);
    assert_eq!(current.subnets[2].renew_timer, 1000);
    assert_eq!(current.decline_probation_period, 600);
    assert_eq!(current.dhcp4o6_port, 6767);
    assert_eq!(current.rsoo.iter().copied().collect::<Vec<_>>(), vec![23, 65, 1027]);
    assert_eq!(current.options.get("isc", 1000).unwrap().data, vec![0, 12]);
    assert_eq!(current.expiration.max_reclaim_leases, 50);
    assert!(current.interfaces.re_detect);
    assert_eq!(*loader.loaded.lock().unwrap(), vec!["/usr/lib/libdhcp_test.so"]);
    assert_eq!(engine.runtime_option_defs().len(), 1);
}

#[test]
fn test_loading_twice_is_idempotent() {
    let mut engine = engine(RecordingChannel::default(), RecordingLoader::default());
    assert!(engine.configure(&full_document(4000), false).is_success());
    let first = engine.current();
    assert!(engine.configure(&full_document(4000), false).is_success());
    let second = engine.current();

    assert_eq!(*first, *second);
    let ids: Vec<u32> = second.subnets.iter().map(|subnet| subnet.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_failing_parser_leaves_current_untouched() {
    let keys: Vec<String> = ParserRegistry::dhcp6().keys().map(str::to_string).collect();
    assert!(keys.len() >= 15);

    for key in keys {
        for mode in [FAIL, PANIC] {
            let switch = Arc::new(AtomicU8::new(PASS));
            let mut registry = ParserRegistry::dhcp6();
            registry.register(
                &key,
                Switchable {
                    key: key.clone(),
                    real: ParserRegistry::dhcp6(),
                    mode: Arc::clone(&switch),
                },
            );
            let mut engine = engine(RecordingChannel::default(), RecordingLoader::default())
                .with_registry(registry);

            assert!(engine.configure(&full_document(4000), false).is_success());
            let before = snapshot(&engine);
            let defs_before = engine.runtime_option_defs().clone();

            switch.store(mode, Ordering::SeqCst);
            let answer = engine.configure(&full_document(5000), false);
            assert_eq!(answer.code, STATUS_VALIDATION_FAILED, "key {key}");
            if mode == PANIC {
                assert_eq!(answer.message, "undefined configuration processing error");
            } else {
                assert!(answer.message.contains(&key), "{}", answer.message);
            }
            assert_eq!(snapshot(&engine), before, "key {key}");
            assert_eq!(engine.runtime_option_defs(), &defs_before, "key {key}");
        }
    }
}

#[test]
fn test_global_parameters_failure_rolls_back() {
    let mut engine = engine(RecordingChannel::default(), RecordingLoader::default());
    assert!(engine.configure(&full_document(4000), false).is_success());
    let before = snapshot(&engine);

    let document = ConfigNode::from(serde_json::json!({ "dhcp4o6-port": 70000 }));
    let answer = engine.configure(&document, false);
    assert_eq!(answer.code, STATUS_VALIDATION_FAILED);
    assert!(answer.message.contains("dhcp4o6-port"));
    assert_eq!(snapshot(&engine), before);
}

#[test]
fn test_check_only() {
    let channel = RecordingChannel::default();
    let loader = RecordingLoader::default();
    let mut engine = engine(channel.clone(), loader.clone());
    let before = snapshot(&engine);

    let answer = engine.configure(&full_document(4000), true);
    assert_eq!(answer.code, 0);
    assert_eq!(answer.message, CHECK_ONLY_MESSAGE);
    assert_eq!(snapshot(&engine), before);
    assert!(channel.take().is_empty());
    assert!(loader.loaded.lock().unwrap().is_empty());
    assert!(engine.runtime_option_defs().is_empty());

    let invalid =
        ConfigNode::from(serde_json::json!({ "subnet6": [{ "subnet": "not-a-prefix" }] }));
    let answer = engine.configure(&invalid, true);
    assert_eq!(answer.code, STATUS_VALIDATION_FAILED);
    assert_eq!(snapshot(&engine), before);
}

#[test]
fn test_unknown_key_is_reported_with_position() {
    let mut engine = engine(RecordingChannel::default(), RecordingLoader::default());
    let document = ConfigNode::parse(
        "{\n  \"valid-lifetime\": 4000,\n  \"foo-bar\": true,\n  \"subnet6\": []\n}",
    )
    .unwrap();
    let answer = engine.configure(&document, false);
    assert_eq!(answer.code, STATUS_VALIDATION_FAILED);
    assert_eq!(
        answer.message,
        "unsupported global configuration parameter: foo-bar (3:14)"
    );
}

#[test]
fn test_first_error_follows_document_order() {
    let mut engine = engine(RecordingChannel::default(), RecordingLoader::default());

    let parsed = ConfigNode::parse(r#"{"subnet6": "not a list", "foo-bar": 1}"#).unwrap();
    let answer = engine.configure(&parsed, false);
    assert_eq!(answer.code, STATUS_VALIDATION_FAILED);
    assert_eq!(answer.message, "'subnet6' must be a list, got string (1:13)");

    let built = ConfigNode::from(serde_json::json!({ "subnet6": "not a list", "foo-bar": 1 }));
    let answer = engine.configure(&built, false);
    assert_eq!(answer.code, STATUS_VALIDATION_FAILED);
    assert_eq!(answer.message, "'subnet6' must be a list, got string (0:0)");

    let reversed = ConfigNode::from(serde_json::json!({ "foo-bar": 1, "subnet6": "not a list" }));
    let answer = engine.configure(&reversed, false);
    assert_eq!(
        answer.message,
        "unsupported global configuration parameter: foo-bar (0:0)"
    );
}

#[test]
fn test_validation_error_names_line_and_column() {
    let mut engine = engine(RecordingChannel::default(), RecordingLoader::default());
    let document = ConfigNode::parse(
        "{\n  \"relay-supplied-options\": [\n    \"dns-servers\",\n    \"70000\"\n  ]\n}",
    )
    .unwrap();
    let answer = engine.configure(&document, false);
    assert_eq!(answer.code, STATUS_VALIDATION_FAILED);
    assert!(answer.message.ends_with("(4:5)"), "{}", answer.message);
}

#[test]
fn test_hook_validation_failure_is_validation_error() {
    let loader = RecordingLoader {
        reject: true,
        ..RecordingLoader::default()
    };
    let mut engine = engine(RecordingChannel::default(), loader);
    let answer = engine.configure(&full_document(4000), false);
    assert_eq!(answer.code, STATUS_VALIDATION_FAILED);
    assert!(engine.current().subnets.is_empty());
}

#[test]
fn test_commit_failures_report_status_two() {
    let channel = RecordingChannel {
        fail_open: true,
        ..RecordingChannel::default()
    };
    let mut engine = engine(channel, RecordingLoader::default());
    let before = snapshot(&engine);
    let answer = engine.configure(&full_document(4000), false);
    assert_eq!(answer.code, STATUS_COMMIT_FAILED);
    assert!(answer.message.contains("/tmp/dhcpconf-test.sock"));
    assert_eq!(snapshot(&engine), before);
    assert!(engine.runtime_option_defs().is_empty());

    let loader = RecordingLoader {
        fail_load: true,
        ..RecordingLoader::default()
    };
    let channel = RecordingChannel::default();
    let mut engine = self::engine(channel.clone(), loader);
    let document = ConfigNode::from(serde_json::json!({
        "control-socket": { "socket-type": "unix", "socket-name": "/tmp/a.sock" },
        "dhcp-ddns": { "enable-updates": true, "qualifying-suffix": "example.org" },
        "hooks-libraries": [{ "library": "/usr/lib/libdhcp_test.so" }]
    }));
    let answer = engine.configure(&document, false);
    assert_eq!(answer.code, STATUS_COMMIT_FAILED);
    assert!(engine.current().control_socket.is_none());
    // Steps before the hook load already ran and stay in effect.
    assert_eq!(channel.take(), vec!["close", "open /tmp/a.sock"]);
    assert!(engine.d2_client_config().enable_updates);
}

#[test]
fn test_command_channel_reopened_only_on_change() {
    let channel = RecordingChannel::default();
    let mut engine = engine(channel.clone(), RecordingLoader::default());
    let with_socket = |name: &str| {
        ConfigNode::from(serde_json::json!({
            "control-socket": { "socket-type": "unix", "socket-name": name }
        }))
    };

    assert!(engine.configure(&ConfigNode::from(serde_json::json!({})), false).is_success());
    assert!(channel.take().is_empty());

    assert!(engine.configure(&with_socket("/tmp/a.sock"), false).is_success());
    assert_eq!(channel.take(), vec!["close", "open /tmp/a.sock"]);

    assert!(engine.configure(&with_socket("/tmp/a.sock"), false).is_success());
    assert!(channel.take().is_empty());

    assert!(engine.configure(&with_socket("/tmp/b.sock"), false).is_success());
    assert_eq!(channel.take(), vec!["close", "open /tmp/b.sock"]);

    assert!(engine.configure(&ConfigNode::from(serde_json::json!({})), false).is_success());
    assert_eq!(channel.take(), vec!["close"]);
}

#[test]
fn test_handle_sees_each_commit() {
    let mut engine = engine(RecordingChannel::default(), RecordingLoader::default());
    let handle = engine.handle();
    assert!(handle.load().subnets.is_empty());

    assert!(engine.configure(&full_document(4000), false).is_success());
    let held = handle.load();
    assert!(engine.configure(&ConfigNode::from(serde_json::json!({})), false).is_success());

    assert_eq!(held.subnets.len(), 3);
    assert!(handle.load().subnets.is_empty());
}

#[test]
fn test_configuration_file_with_comments() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        r#"
        // subnet for the lab
        {
            "subnet6": [ { "subnet": "2001:db8:1::/64" } ], # trailing comment
            /* global options */
            "option-data": [ { "code": 1027, "data": "0x0102" } ]
        }
        "#,
    )
    .unwrap();

    let document = ConfigNode::load(file.path()).unwrap();
    let mut engine = engine(RecordingChannel::default(), RecordingLoader::default());
    assert!(engine.configure(&document, false).is_success());
    assert_eq!(engine.current().options.get("dhcp6", 1027).unwrap().data, vec![1, 2]);
}

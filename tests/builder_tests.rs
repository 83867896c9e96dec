// Integration tests for deployment configuration building and volume accounting
mod common;

use common::{backend, bridge, template};
use dockyard::builder::{self, NameResolution};
use dockyard::template::{VolumeBindingType, VolumeDeclaration};
use dockyard::volumes;

#[test]
fn test_bridge_network_resolves_by_ip() {
    let t = template(r#"{ "title": "Nginx", "image": "nginx" }"#);
    let config = builder::build(&t, "web", &bridge(), &[]);

    assert_eq!(config.name_resolution, NameResolution::ByContainerIp);
    assert_eq!(config.network_mode, "bridge");
    assert_eq!(config.image, "nginx:latest");
    assert_eq!(config.name.as_deref(), Some("web"));
}

#[test]
fn test_user_network_resolves_by_name() {
    let t = template(r#"{ "title": "Nginx", "image": "nginx" }"#);
    let config = builder::build(&t, "", &backend(), &[]);

    assert_eq!(config.name_resolution, NameResolution::ByContainerName);
    assert_eq!(config.network_mode, "backend");
    assert!(config.name.is_none(), "Empty name lets the engine choose");
}

#[test]
fn test_ports_are_published_with_protocol() {
    let t = template(
        r#"{
            "title": "DNS",
            "image": "coredns/coredns",
            "ports": [
                { "host_port": "127.0.0.1:5353", "container_port": 53, "protocol": "udp" },
                { "host_port": "8080", "container_port": 80 },
                { "container_port": 443 }
            ]
        }"#,
    );
    let config = builder::build(&t, "dns", &bridge(), &[]);

    let keys: Vec<String> = config.ports.iter().map(|p| p.key()).collect();
    assert_eq!(keys, vec!["53/udp", "80/tcp", "443/tcp"]);
    assert_eq!(config.ports[0].host_ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(config.ports[0].host_port.as_deref(), Some("5353"));
    assert_eq!(config.ports[1].host_ip, None);
    assert_eq!(config.ports[1].host_port.as_deref(), Some("8080"));
    assert_eq!(config.ports[2].host_port, None);
}

#[test]
fn test_labels_and_env_skip_empty_entries() {
    let t = template(
        r#"{
            "title": "App",
            "image": "app:1.0",
            "labels": [
                { "name": "team", "value": "ops" },
                { "name": "", "value": "orphan" },
                { "name": "empty", "value": "" }
            ],
            "env": [
                { "name": "MODE", "value": "prod" },
                { "name": "LEVEL", "value": "info", "set": "debug" },
                { "name": "UNSET" },
                { "name": "DB", "type": "container", "value": "/postgres" }
            ]
        }"#,
    );
    let config = builder::build(&t, "app", &backend(), &[]);

    assert_eq!(config.labels.len(), 1);
    assert_eq!(config.labels.get("team").map(String::as_str), Some("ops"));
    assert_eq!(config.env, vec!["MODE=prod", "LEVEL=debug"]);
    assert_eq!(config.service_references.len(), 1);
    assert_eq!(config.service_references[0].variable, "DB");
    assert_eq!(config.service_references[0].container, "postgres");
}

#[test]
fn test_generated_volumes_bind_in_declaration_order() {
    let t = template(
        r#"{
            "title": "Multi",
            "image": "app",
            "volumes": [
                { "container": "/config" },
                { "container": "/srv", "bind": "/opt/srv", "type": "bind", "readonly": true },
                { "container": "/cache" },
                { "container": "/named", "bind": "shared", "type": "volume" }
            ]
        }"#,
    );
    let generated = vec!["vol1".to_string(), "vol2".to_string()];
    let config = builder::build(&t, "multi", &bridge(), &generated);

    assert_eq!(
        config.binds(),
        vec![
            "vol1:/config",
            "/opt/srv:/srv:ro",
            "vol2:/cache",
            "shared:/named",
        ]
    );
    assert_eq!(config.generated_volume_ids(), vec!["vol1", "vol2"]);
}

#[test]
fn test_registry_prefixes_image() {
    let t = template(
        r#"{ "title": "Private", "image": "team/app:2.1", "registry": "registry.local:5000" }"#,
    );
    let config = builder::build(&t, "private", &bridge(), &[]);
    assert_eq!(config.image, "registry.local:5000/team/app:2.1");
}

#[test]
#[should_panic(expected = "generated volume count")]
fn test_mismatched_volume_ids_is_a_defect() {
    let t = template(
        r#"{ "title": "Nginx", "image": "nginx", "volumes": [{ "container": "/data" }] }"#,
    );
    builder::build(&t, "web", &bridge(), &[]);
}

#[test]
fn test_required_count_ignores_order_and_bound_volumes() {
    let a = vec![
        VolumeDeclaration::auto("/a"),
        VolumeDeclaration::bound("/b", "/host/b", VolumeBindingType::Bind),
        VolumeDeclaration::auto("/c"),
    ];
    let mut b = a.clone();
    b.reverse();

    assert_eq!(volumes::required_count(&a), 2);
    assert_eq!(volumes::required_count(&a), volumes::required_count(&b));
    assert_eq!(volumes::required_count(&[]), 0);
}

#[test]
fn test_auto_volume_with_bind_is_not_generated() {
    let mut declared = VolumeDeclaration::auto("/data");
    declared.bind = Some("existing".to_string());
    assert!(!declared.needs_generated_volume());

    declared.bind = Some("   ".to_string());
    assert!(declared.needs_generated_volume());
}

#[test]
fn test_bind_without_source_is_rejected_and_never_mounted() {
    let t = template(
        r#"{
            "title": "Blank",
            "image": "app",
            "volumes": [
                { "container": "/data", "type": "bind", "bind": "" },
                { "container": "/named", "type": "volume" }
            ]
        }"#,
    );

    assert_eq!(
        builder::check_volumes(&t.volumes),
        Err("volume /data has no host path".to_string())
    );
    assert_eq!(
        builder::check_volumes(&t.volumes[1..]),
        Err("volume /named has no volume name".to_string())
    );

    let config = builder::build(&t, "blank", &bridge(), &[]);
    assert!(config.binds().is_empty());
}

#[test]
fn test_complete_volumes_pass_the_check() {
    let t = template(
        r#"{
            "title": "Ok",
            "image": "app",
            "volumes": [
                { "container": "/data" },
                { "container": "/srv", "type": "bind", "bind": "/opt/srv" }
            ]
        }"#,
    );
    assert!(builder::check_volumes(&t.volumes).is_ok());
}

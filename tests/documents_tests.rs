// Flattening derived records into ingestible documents.

mod common;

use common::redundant_pair;
use magnum_poller::aggregator::HealthAggregator;
use magnum_poller::classifier::MetricClassifier;
use magnum_poller::documents::{REDUNDANCY_DOCUMENT, SERVICE_DOCUMENT, build_documents, to_json};
use magnum_poller::models::{RedundancyStateMap, ServiceStateMap};
use serde_json::Value;

fn derived() -> (ServiceStateMap, RedundancyStateMap) {
    let classified = MetricClassifier::auto_discover().classify_all(&redundant_pair());
    HealthAggregator::new(vec!["eventd".into()], "Magnum").aggregate(&classified)
}

#[test]
fn one_document_per_record() {
    let (services, redundancy) = derived();
    let docs = build_documents(&services, &redundancy).unwrap();

    // Two hosts: two services plus the rollup each, then one redundancy record each.
    assert_eq!(docs.len(), 8);
    assert_eq!(docs.iter().filter(|d| d.name == SERVICE_DOCUMENT).count(), 6);
    assert_eq!(docs.iter().filter(|d| d.name == REDUNDANCY_DOCUMENT).count(), 2);
}

#[test]
fn service_document_uses_wire_field_names() {
    let (services, redundancy) = derived();
    let docs = build_documents(&services, &redundancy).unwrap();
    let nginx = docs
        .iter()
        .find(|d| d.host == "host-a" && d.fields["s_service"] == "nginx")
        .expect("nginx document");

    assert_eq!(nginx.fields["s_state"], "Running");
    assert_eq!(nginx.fields["d_cpu_p"], 0.125);
    assert_eq!(nginx.fields["l_memory_b"], 1_500_000);
    assert_eq!(nginx.fields["i_pid"], "4242");
    assert_eq!(nginx.fields["s_status"], "Ok");
    assert_eq!(nginx.fields["s_type"], "service");
}

#[test]
fn absent_fields_are_left_out() {
    let (services, redundancy) = derived();
    let docs = build_documents(&services, &redundancy).unwrap();
    let nginx = docs
        .iter()
        .find(|d| d.fields["s_service"] == "nginx")
        .expect("nginx document");
    let fields = nginx.fields.as_object().unwrap();
    assert!(!fields.contains_key("s_cluster"));
    assert!(fields.values().all(|v| !v.is_null()));
}

#[test]
fn overall_and_redundancy_documents() {
    let (services, redundancy) = derived();
    let docs = build_documents(&services, &redundancy).unwrap();

    let overall = docs
        .iter()
        .find(|d| d.host == "host-b" && d.fields["s_type"] == "overall")
        .expect("overall document");
    assert_eq!(overall.name, SERVICE_DOCUMENT);
    assert_eq!(overall.fields["s_service"], "overall_health");
    assert_eq!(overall.fields["i_num_services"], 2);
    assert_eq!(overall.fields["i_num_failed"], 0);

    let standby = docs
        .iter()
        .find(|d| d.name == REDUNDANCY_DOCUMENT && d.host == "host-b")
        .expect("redundancy document");
    assert_eq!(standby.fields["s_status"], "Server Standby/Online");
    assert_eq!(standby.fields["s_system"], "Magnum");
    assert_eq!(standby.fields["s_online"], "Yes");
}

#[test]
fn empty_maps_give_no_documents() {
    let docs = build_documents(&ServiceStateMap::new(), &RedundancyStateMap::new()).unwrap();
    assert!(docs.is_empty());
    assert_eq!(to_json(&docs).unwrap(), "[]");
}

#[test]
fn json_output_is_an_array_of_documents() {
    let (services, redundancy) = derived();
    let docs = build_documents(&services, &redundancy).unwrap();
    let parsed: Value = serde_json::from_str(&to_json(&docs).unwrap()).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), docs.len());
    assert!(arr[0]["fields"].is_object());
    assert!(arr[0]["host"].is_string());
    assert!(arr[0]["name"].is_string());
}

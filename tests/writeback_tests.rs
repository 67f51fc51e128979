//! Integration tests for inserts, partial updates and deletes.

mod common;

use common::{TestEnv, driver_err, edge_record, vertex_record};
use odbgraph::{Direction, DriverError, Vertex, create_edge};
use serde_json::json;
use std::rc::Rc;

// =============================================================================
// Insert
// =============================================================================

#[test]
fn test_insert_then_select_round_trip() {
    let mut env = TestEnv::connected();
    let vertex = Vertex::new("Gopher").into_ref();
    vertex.borrow_mut().set_props([("a", json!(1)), ("b", json!("x"))]).unwrap();

    env.push_result(json!([vertex_record("#9:0", "Gopher", 1, json!({"a": 1, "b": "x"}))]));
    env.conn.insert_vertex(&vertex).unwrap();

    assert_eq!(env.commands().last().unwrap(), "CREATE VERTEX Gopher SET a=1, b=\"x\"");
    assert_eq!(vertex.borrow().rid, "#9:0");
    assert_eq!(vertex.borrow().version, 1);
    assert!(!vertex.borrow().is_dirty());

    env.push_result(json!([vertex_record("#9:0", "Gopher", 1, json!({"a": 1, "b": "x"}))]));
    let selected = env.conn.select_vertexes("#9:0", None, "").unwrap();

    let v = selected[0].borrow();
    assert_eq!(v.get_int("a").unwrap(), 1);
    assert_eq!(v.get_str("b").unwrap(), "x");
    assert_eq!(v.version, 1);
    drop(v);
    assert!(Rc::ptr_eq(&selected[0], &vertex));
}

#[test]
fn test_insert_without_properties() {
    let mut env = TestEnv::connected();
    let vertex = Vertex::new("Gopher").into_ref();

    env.push_result(json!([{"@rid": "#9:4"}]));
    env.conn.insert_vertex(&vertex).unwrap();

    assert_eq!(env.commands().last().unwrap(), "CREATE VERTEX Gopher");
    assert!(env.conn.vertex("#9:4").is_some());
}

#[test]
fn test_insert_failure_leaves_vertex_local() {
    let mut env = TestEnv::connected();
    let vertex = Vertex::new("Gopher").into_ref();
    vertex.borrow_mut().set_prop("name", "Sue");

    env.push_error("500", "Class 'Gopher' not found");
    let err = driver_err(env.conn.insert_vertex(&vertex).unwrap_err());

    assert!(matches!(err, DriverError::Command { .. }));
    assert!(!vertex.borrow().is_persisted());
    assert!(vertex.borrow().is_dirty());
    assert_eq!(env.conn.cache().vertex_count(), 0);
}

#[test]
fn test_insert_edge_patches_cached_endpoints() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({"name": "Sue"})));
    let bob = env.load_vertex(vertex_record("#9:1", "Gopher", 1, json!({"name": "Bob"})));

    let edge = create_edge(&sue.borrow(), "owes", &bob.borrow()).into_ref();
    edge.borrow_mut().set_props([("howmuch", json!(111))]).unwrap();

    env.push_result(json!([{"@rid": "#11:0", "@version": 1}]));
    env.conn.insert_edge(&edge).unwrap();

    assert_eq!(
        env.commands().last().unwrap(),
        "CREATE EDGE owes FROM #9:0 TO #9:1 SET howmuch=111"
    );
    assert_eq!(edge.borrow().rid, "#11:0");
    assert_eq!(edge.borrow().version, 1);
    assert_eq!(sue.borrow().stubs(Direction::Out, Some("owes")), vec!["#11:0"]);
    assert_eq!(bob.borrow().stubs(Direction::In, Some("owes")), vec!["#11:0"]);

    // Resolution now needs no network
    let before = env.command_count();
    let owed = env.conn.vertex_edges(&bob, Direction::In, Some("#9:0"), Some("owes")).unwrap();
    assert!(Rc::ptr_eq(&owed[0], &edge));
    assert_eq!(env.command_count(), before);
}

#[test]
fn test_insert_edge_with_local_endpoint_fails() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({})));
    let local = Vertex::new("Gopher");

    let edge = create_edge(&sue.borrow(), "owes", &local).into_ref();
    let before = env.command_count();
    let err = driver_err(env.conn.insert_edge(&edge).unwrap_err());

    assert!(matches!(err, DriverError::MissingRid(_)));
    assert_eq!(env.command_count(), before);
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn test_update_sends_each_property_once() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({"a": 0})));
    sue.borrow_mut().set_props([("a", 1)]).unwrap();
    sue.borrow_mut().set_props([("a", 2)]).unwrap();

    env.push_result(json!([{"value": 2}]));
    env.conn.update_vertex(&sue).unwrap();

    let command = env.commands().last().unwrap().clone();
    assert_eq!(command, "UPDATE #9:0 SET a=2 RETURN AFTER @version");
    assert_eq!(command.matches("a=").count(), 1);
    assert_eq!(sue.borrow().version, 2);
    assert!(!sue.borrow().is_dirty());
}

#[test]
fn test_update_removed_property() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({})));

    sue.borrow_mut().set_prop("a", 1);
    env.push_result(json!([{"value": 2}]));
    env.conn.update_vertex(&sue).unwrap();

    sue.borrow_mut().remove_prop("a");
    env.push_result(json!([{"value": 3}]));
    env.conn.update_vertex(&sue).unwrap();

    assert_eq!(
        env.commands().last().unwrap(),
        "UPDATE #9:0 REMOVE a RETURN AFTER @version"
    );
    assert_eq!(sue.borrow().version, 3);
}

#[test]
fn test_update_mixed_set_and_remove() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 4, json!({"nick": "S", "age": 3})));

    sue.borrow_mut().set_prop("name", "Mary");
    sue.borrow_mut().remove_prop("nick");
    sue.borrow_mut().set_prop("age", 4);
    env.push_result(json!([{"value": 5}]));
    env.conn.update_vertex(&sue).unwrap();

    assert_eq!(
        env.commands().last().unwrap(),
        "UPDATE #9:0 SET name=\"Mary\", age=4 REMOVE nick RETURN AFTER @version"
    );
}

#[test]
fn test_update_without_changes_is_noop() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({"a": 1})));
    let before = env.command_count();

    env.conn.update_vertex(&sue).unwrap();
    assert_eq!(env.command_count(), before);
}

#[test]
fn test_update_local_vertex_is_missing_rid() {
    let mut env = TestEnv::connected();
    let local = Vertex::new("Gopher").into_ref();
    local.borrow_mut().set_prop("a", 1);

    let err = driver_err(env.conn.update_vertex(&local).unwrap_err());
    assert!(matches!(err, DriverError::MissingRid(_)));
    assert_eq!(env.command_count(), 0);
}

#[test]
fn test_update_failure_keeps_diff() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({})));
    sue.borrow_mut().set_prop("name", "Mary");

    env.push_error("409", "concurrent modification");
    assert!(env.conn.update_vertex(&sue).is_err());

    assert_eq!(sue.borrow().diff(), ["name"]);
    assert_eq!(sue.borrow().version, 1);

    // Retry sends the same change
    env.push_result(json!([{"value": 2}]));
    env.conn.update_vertex(&sue).unwrap();
    assert_eq!(
        env.commands().last().unwrap(),
        "UPDATE #9:0 SET name=\"Mary\" RETURN AFTER @version"
    );
}

#[test]
fn test_update_edge() {
    let mut env = TestEnv::connected();
    let owes = env.load_edges(json!([edge_record("#11:0", "owes", "#9:0", "#9:1")]));
    owes[0].borrow_mut().set_prop("howmuch", 50);

    env.push_result(json!([{"value": 2}]));
    env.conn.update_edge(&owes[0]).unwrap();

    assert_eq!(
        env.commands().last().unwrap(),
        "UPDATE #11:0 SET howmuch=50 RETURN AFTER @version"
    );
    assert_eq!(owes[0].borrow().version, 2);
}

// =============================================================================
// Delete
// =============================================================================

#[test]
fn test_delete_edges_drops_stubs() {
    let mut env = TestEnv::connected();
    let sue = env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({"out_owes": ["#11:0", "#11:1"]})));
    env.load_edges(json!([
        edge_record("#11:0", "owes", "#9:0", "#9:1"),
        edge_record("#11:1", "owes", "#9:0", "#9:2"),
    ]));

    env.push_result(json!([{"value": 1}]));
    env.conn.delete_edges(&["#11:0"]).unwrap();

    assert_eq!(env.commands().last().unwrap(), "DELETE EDGE #11:0");
    assert!(env.conn.edge("#11:0").is_none());
    assert_eq!(sue.borrow().stubs(Direction::Out, Some("owes")), vec!["#11:1"]);
}

#[test]
fn test_delete_vertexes_evicts_incident_edges() {
    let mut env = TestEnv::connected();
    env.load_vertex(vertex_record("#9:0", "Gopher", 1, json!({})));
    let bob = env.load_vertex(vertex_record("#9:1", "Gopher", 1, json!({"in_owes": ["#11:0"]})));
    env.load_edges(json!([edge_record("#11:0", "owes", "#9:0", "#9:1")]));

    env.push_result(json!([{"value": 1}]));
    env.conn.delete_vertexes(&["#9:0"]).unwrap();

    assert_eq!(env.commands().last().unwrap(), "DELETE VERTEX #9:0");
    assert!(env.conn.vertex("#9:0").is_none());
    assert!(env.conn.edge("#11:0").is_none());
    assert!(bob.borrow().stubs(Direction::In, Some("owes")).is_empty());
}

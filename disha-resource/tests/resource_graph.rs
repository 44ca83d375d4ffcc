//! Resource graph loading tests.
//!
//! These tests build small resource bundles on disk and check reference
//! resolution, inheritance and per-node diagnostics end to end.

use disha_resource::{load_destinations_file, load_tours_file, Language, ResourceManager};
use std::fs;
use std::path::Path;

fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn test_value_and_reference_entries() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "destinations.yaml", "- value: A\n- ref: other.yaml/B\n");
    write(dir.path(), "other.yaml", "- value: B\n  title: Bakery\n  title-ja: パン屋\n");

    let list = load_destinations_file(&dir.path().join("destinations.yaml")).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].value.as_deref(), Some("A"));
    assert!(list[0].error.is_none());

    let second = &list[1];
    assert!(second.error.is_none(), "unexpected error: {:?}", second.error);
    assert_eq!(second.value.as_deref(), Some("B"));
    assert_eq!(second.display_title(&Language::new("en")), "Bakery");
    assert_eq!(second.display_title(&Language::new("ja")), "パン屋");
    let reference = second.reference.as_ref().unwrap();
    assert_eq!(reference.file, "other.yaml");
    assert_eq!(reference.value, "B");
}

#[test]
fn test_present_attributes_override_inherited() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "d.yaml",
        "- ref: shared/rooms.yaml/201\n  title: Meeting room\n",
    );
    write(
        dir.path(),
        "shared/rooms.yaml",
        r#"
- value: "201"
  title: Room 201
  content: {type: local, src: "201-%@.md"}
  arriveMessages:
    - {type: local, src: "arrive-201.txt"}
  waitingDestination: {value: "201-w"}
"#,
    );
    write(dir.path(), "shared/201-en.md", "Meeting room 201\r\n");

    let list = load_destinations_file(&dir.path().join("d.yaml")).unwrap();
    let dest = &list[0];
    let en = Language::new("en");
    assert_eq!(dest.display_title(&en), "Meeting room");
    assert_eq!(dest.value.as_deref(), Some("201"));
    assert_eq!(dest.arrive_messages.len(), 1);
    assert_eq!(
        dest.waiting_destination.as_ref().and_then(|w| w.value.as_deref()),
        Some("201-w")
    );
    // Inherited sources stay relative to the file that declared them.
    let content = dest.content.as_ref().unwrap().content(&en);
    assert_eq!(content.as_deref(), Some("Meeting room 201\n"));
}

#[test]
fn test_reference_cycle_terminates_with_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.yaml", "- value: X\n  ref: b.yaml/X\n");
    write(dir.path(), "b.yaml", "- value: X\n  ref: a.yaml/X\n");

    let list = load_destinations_file(&dir.path().join("a.yaml")).unwrap();
    assert_eq!(list.len(), 1);
    let error = list[0].error.as_deref().unwrap();
    assert!(error.contains("too deep"), "{}", error);
    assert!(error.starts_with("a.yaml[0]: "));
}

#[test]
fn test_self_reference_terminates() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "loop.yaml", "- {value: L, title: Loop, ref: loop.yaml/L}\n");
    let list = load_destinations_file(&dir.path().join("loop.yaml")).unwrap();
    assert!(list[0].error.as_deref().unwrap().contains("too deep"));
    assert_eq!(list[0].display_title(&Language::default()), "Loop");
}

#[test]
fn test_resolution_failures_are_recorded_per_node() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "d.yaml",
        r#"
- {value: ok, title: Fine}
- {ref: other.yaml/missing}
- {ref: other.yaml/dup}
- {ref: nowhere.yaml/x}
- {ref: no-slash}
- just a string
"#,
    );
    write(dir.path(), "other.yaml", "- {value: dup}\n- {value: dup}\n");

    let list = load_destinations_file(&dir.path().join("d.yaml")).unwrap();
    assert_eq!(list.len(), 6);
    assert!(list[0].error.is_none());
    assert!(list[1].error.as_deref().unwrap().contains("not found"));
    assert!(list[2].error.as_deref().unwrap().contains("multiple found (2)"));
    assert!(list[3].error.as_deref().unwrap().contains("cannot read file"));
    assert!(list[4].error.as_deref().unwrap().contains("syntax error"));
    assert_eq!(list[5].error.as_deref(), Some("d.yaml[5]: not a map"));
}

#[test]
fn test_tour_reference_and_subtour() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "tours.yaml",
        r#"
- id: main
  title: Main tour
  setting: {enableSubtourOnHandle: true}
  destinations:
    - value: hall
      title: Hall
      subtour:
        ref: extra.yaml/side
    - value: exit
- ref: extra.yaml/side
  title: Side trip (copy)
"#,
    );
    write(
        dir.path(),
        "extra.yaml",
        r#"
- id: side
  title: Side trip
  introduction: A short detour.
  destinations:
    - {value: s1, title: Statue}
"#,
    );

    let tours = load_tours_file(&dir.path().join("tours.yaml")).unwrap();
    assert_eq!(tours.len(), 2);
    let en = Language::default();

    let main = &tours[0];
    assert!(main.error.is_none(), "{:?}", main.error);
    assert!(main.setting().enable_subtour_on_handle);
    let hall = &main.destinations[0];
    assert_eq!(hall.parent().unwrap().id, "main");
    let subtour = hall.subtour.as_ref().unwrap();
    assert_eq!(subtour.id, "side");
    assert_eq!(subtour.destinations[0].parent().unwrap().id, "side");
    // Untitled destination borrows the tour title.
    assert_eq!(main.destinations[1].display_title(&en), "Main tour");

    let copy = &tours[1];
    assert_eq!(copy.id, "side");
    assert_eq!(copy.title.text(&en), "Side trip (copy)");
    assert_eq!(copy.introduction.text(&en), "A short detour.");
    assert_eq!(copy.destinations[0].parent().unwrap().title.text(&en), "Side trip (copy)");
}

#[test]
fn test_tour_reference_cycle_terminates() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "tours.yaml", "- {id: t, ref: tours.yaml/t}\n");
    let tours = load_tours_file(&dir.path().join("tours.yaml")).unwrap();
    assert!(tours[0].error.as_deref().unwrap().contains("too deep"));
}

#[test]
fn test_activate_resource() {
    let root = tempfile::tempdir().unwrap();
    let site = root.path().join("site");
    write(
        &site,
        "_metadata.yaml",
        "name: site\ndestinations: {type: local, src: destinations.yaml}\ntours: {type: local, src: tours-%@.yaml}\n",
    );
    write(&site, "destinations.yaml", "- {value: a, title: A}\n- {value: b, title: B}\n");
    write(&site, "tours-en.yaml", "- {id: t, title: Tour, destinations: [{value: a}]}\n");
    write(&site, "tours-ja.yaml", "- {id: t, title: ツアー, destinations: [{value: a}]}\n");

    let manager = ResourceManager::new(root.path(), &Language::default());
    let resource = manager.resource("site").unwrap();

    let active = resource.activate(&Language::new("en"));
    assert!(active.errors.is_empty());
    assert_eq!(active.destinations.len(), 2);
    assert!(active.destination("b").is_some());
    assert_eq!(active.tour("t").unwrap().title.text(&Language::new("en")), "Tour");

    let ja = Language::new("ja");
    let active = resource.activate(&ja);
    assert_eq!(active.tour("t").unwrap().title.text(&ja), "ツアー");
}

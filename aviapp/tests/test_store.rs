use std::io::Write;

use avigeo::Mode;
use aviapp::{media_content_present, RouteStore, YamlRouteStore};

const ROUTES_YAML: &str = r#"
routes:
  - id: 12
    name: "Line 12 - depot to market"
    frames:
      - id: 1
        zone:
          kind: circle
          lat: 55.751244
          lon: 37.618423
          radius_m: 250.0
          course_mask: 3
        media:
          filename: "depot.mp3"
          play_mode: 3
          id_next: 100
      - id: 2
        zone:
          kind: rectangle
          lat_start: 55.70
          lon_start: 37.60
          lat_end: 55.71
          lon_end: 37.61
        media:
          filename: "market.mp3"
          play_mode: 2
          pause_secs: 5
      - id: 3
        media:
          filename: "unused.mp3"
    children:
      - id: 100
        media:
          filename: "chime.mp3"
          play_mode: 1
  - id: 13
    frames: []
"#;

fn store_from(yaml: &str) -> (tempfile::TempDir, YamlRouteStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.yaml");
    std::fs::write(&path, yaml).unwrap();
    (dir, YamlRouteStore::new(path))
}

#[test]
fn loads_frames_children_and_defaults() {
    let (_dir, store) = store_from(ROUTES_YAML);
    let route = store.load(12).unwrap();

    assert_eq!(route.id(), 12);
    assert_eq!(route.frames().len(), 3);
    assert_eq!(route.child_count(), 1);

    let depot = &route.frames()[0];
    assert_eq!(depot.media.mode, Mode::InterruptedParent);
    assert_eq!(depot.media.id_next, Some(100));

    let market = &route.frames()[1];
    assert_eq!(market.media.mode, Mode::Interrupted);
    assert_eq!(market.media.id_next, None);
    assert_eq!(market.media.pause_secs, 5);

    // A frame may carry no zone at all.
    assert!(route.frames()[2].zone.is_none());

    let chime = route.child(100).unwrap();
    assert_eq!(chime.filename, "chime.mp3");
    assert_eq!(chime.mode, Mode::Queued);
}

#[test]
fn unknown_route_id_is_an_error() {
    let (_dir, store) = store_from(ROUTES_YAML);
    assert!(store.load(99).is_err());
}

#[test]
fn lists_available_routes_with_fallback_names() {
    let (_dir, store) = store_from(ROUTES_YAML);
    let routes = store.available_routes().unwrap();

    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0], (12, "Line 12 - depot to market".to_string()));
    assert_eq!(routes[1], (13, "route 13".to_string()));
}

#[test]
fn bad_rows_are_dropped_but_the_route_still_loads() {
    let yaml = r#"
routes:
  - id: 1
    frames:
      - id: 1
        zone:
          kind: circle
          lat: 200.0
          lon: 37.0
          radius_m: 100.0
        media:
          filename: "bad_zone.mp3"
      - id: 2
        media:
          filename: "bad_mode.mp3"
          play_mode: 9
      - id: 3
        media:
          filename: "good.mp3"
    children:
      - id: 50
        media:
          filename: "bad_child.mp3"
          play_mode: 7
"#;
    let (_dir, store) = store_from(yaml);
    let route = store.load(1).unwrap();

    assert_eq!(route.frames().len(), 1);
    assert_eq!(route.frames()[0].media.filename, "good.mp3");
    assert_eq!(route.child_count(), 0);
}

#[test]
fn unparsable_file_is_an_error() {
    let (_dir, store) = store_from("routes: [not, {a: route");
    assert!(store.load(1).is_err());
}

#[test]
fn media_presence_check_covers_children() {
    let (dir, store) = store_from(ROUTES_YAML);
    let route = store.load(12).unwrap();

    let media = dir.path().join("media");
    std::fs::create_dir(&media).unwrap();
    for name in ["depot.mp3", "market.mp3", "unused.mp3"] {
        let mut f = std::fs::File::create(media.join(name)).unwrap();
        f.write_all(b"x").unwrap();
    }

    // chime.mp3 (the child) is still missing.
    assert!(!media_content_present(&route, &media));

    std::fs::File::create(media.join("chime.mp3")).unwrap();
    assert!(media_content_present(&route, &media));
}

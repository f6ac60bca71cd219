use roster_core::types::{OfficerHolder, OfficerRole, OfficerRoles, RosterDocument, RosterMember};
use roster_renderer::{DocumentEntry, OutputFormat, Renderer, RosterContext};

fn member(last_first: &str, name: &str) -> RosterMember {
    RosterMember {
        sort_key: last_first.to_uppercase(),
        display_name: name.to_string(),
    }
}

#[test]
fn vacant_roster_renders_every_role_as_vacant() {
    let renderer = Renderer::new().expect("renderer");
    let out = renderer
        .render(&RosterDocument::default(), OutputFormat::Markdown)
        .expect("render");

    for role in OfficerRole::all() {
        let line = format!("- {}: vacant\n", role.title());
        assert!(out.contains(&line), "missing {line:?} in\n{out}");
    }
    assert!(out.contains("**Pipers**"));
    assert!(out.trim_end().ends_with("**Drummers**"));
}

#[test]
fn person_in_both_sections_is_listed_twice() {
    let both = member("Ross, Cat", "Cat Ross");
    let doc = RosterDocument {
        officers: OfficerRoles::vacant(),
        pipers: vec![both.clone()],
        drummers: vec![both],
    };
    let out = Renderer::new()
        .unwrap()
        .render(&doc, OutputFormat::Text)
        .unwrap();
    assert_eq!(out.matches("Cat Ross").count(), 2);
}

#[test]
fn entries_mirror_rendered_sections() {
    let mut officers = OfficerRoles::vacant();
    officers.set(
        OfficerRole::Treasurer,
        OfficerHolder::Held("Jane Doe".to_string()),
    );
    let doc = RosterDocument {
        officers,
        pipers: vec![member("Adams, Bob", "Bob Adams")],
        drummers: vec![],
    };

    let entries = RosterContext::from_document(&doc).entries();
    let bullets: Vec<_> = entries
        .iter()
        .filter_map(|e| match e {
            DocumentEntry::Bullet(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(bullets.contains(&"Treasurer: Jane Doe"));
    assert!(bullets.contains(&"Bob Adams"));
    assert_eq!(
        entries
            .iter()
            .filter(|e| matches!(e, DocumentEntry::Header { .. }))
            .count(),
        3
    );
}

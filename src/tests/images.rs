use std::collections::HashSet;

use serde_json::json;

use super::*;
use crate::{
    app::AppError,
    models::{Dimensions, TechnicalMetadata},
    store::{Point, PointId, VectorStore},
};

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn gallery() -> crate::app::AppContext {
    let ctx = test_context();
    let images = &ctx.images;
    images
        .index_image("red", &png([255, 0, 0], 10, 10), "red.png", labels(&["warm", "flat"]), None)
        .unwrap();
    images
        .index_image("dark-red", &png([128, 0, 0], 12, 12), "dark-red.png", labels(&["Warm"]), None)
        .unwrap();
    images
        .index_image("blue", &png([0, 0, 255], 10, 10), "blue.png", labels(&["cold"]), None)
        .unwrap();
    images
        .index_image("green", &png([0, 255, 0], 300, 300), "green.png", Vec::new(), None)
        .unwrap();
    ctx
}

#[test]
fn test_index_image_records_technical_metadata() {
    let ctx = test_context();
    let record = ctx
        .images
        .index_image("pic", &png([1, 2, 3], 40, 20), "pic.png", labels(&["a"]), None)
        .unwrap();

    assert_eq!(record.id, "pic");
    assert_eq!(record.filename, "pic.png");
    assert_eq!(
        record.technical_metadata,
        TechnicalMetadata::Local {
            dimensions: Dimensions {
                width: 40,
                height: 20
            },
            format: "PNG".to_string(),
            mode: "RGB".to_string(),
            size: png([1, 2, 3], 40, 20).len() as u64,
        }
    );
    assert_eq!(
        record.content_features.get("embedding_size"),
        Some(&json!(FakeEmbedder::DIM))
    );
}

#[test]
fn test_remote_images_keep_their_url() {
    let ctx = test_context();
    let record = ctx
        .images
        .index_image(
            "remote",
            &png([9, 9, 9], 2, 2),
            "remote.png",
            Vec::new(),
            Some("https://cdn.example.com/remote.png"),
        )
        .unwrap();
    assert_eq!(
        record.technical_metadata,
        TechnicalMetadata::Remote {
            url: "https://cdn.example.com/remote.png".to_string()
        }
    );
}

#[test]
fn test_find_similar_excludes_the_reference() {
    let ctx = gallery();

    let response = ctx.images.find_similar("red", None, None).unwrap();
    let ids: Vec<&str> = response.recommendations.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "dark-red");
    assert!(!ids.contains(&"red"));
    assert_eq!(response.next_token, None);

    let closest = &response.recommendations[0];
    assert!(closest.similarity_score > response.recommendations[1].similarity_score);
    assert_eq!(
        closest.similarity_aspects,
        vec![
            "Shared labels: Warm",
            "Similar width",
            "Similar height",
            "Same format: PNG"
        ]
    );

    let green = response
        .recommendations
        .iter()
        .find(|r| r.id == "green")
        .unwrap();
    assert_eq!(green.similarity_aspects, vec!["Same format: PNG"]);
}

#[test]
fn test_find_similar_pages_never_repeat() {
    let ctx = gallery();

    let mut seen = HashSet::new();
    let mut token: Option<String> = None;
    let mut pages = 0;
    loop {
        let response = ctx
            .images
            .find_similar("red", Some(1), token.as_deref())
            .unwrap();
        for rec in &response.recommendations {
            assert_ne!(rec.id, "red");
            assert!(seen.insert(rec.id.clone()), "{} repeated", rec.id);
        }
        pages += 1;
        token = response.next_token;
        if token.is_none() {
            break;
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen, HashSet::from(["dark-red", "blue", "green"].map(String::from)));
}

#[test]
fn test_find_similar_unknown_reference() {
    let ctx = gallery();
    assert!(matches!(
        ctx.images.find_similar("never-indexed", None, None),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn test_search_by_image() {
    let ctx = gallery();

    let response = ctx
        .images
        .search_by_image(&png([250, 5, 5], 10, 10), Some(2), None)
        .unwrap();
    assert_eq!(response.recommendations.len(), 2);
    assert_eq!(response.recommendations[0].id, "red");
    assert_eq!(response.recommendations[1].id, "dark-red");
    assert_eq!(response.next_token.as_deref(), Some("2"));
    assert!(response.recommendations[0]
        .similarity_aspects
        .contains(&"Same format: PNG".to_string()));

    assert!(matches!(
        ctx.images.search_by_image(b"garbage", None, None),
        Err(AppError::InvalidInput(_))
    ));
}

#[test]
fn test_foreign_payloads_are_described_by_name_and_url() {
    let (ctx, store) = test_context_with(&test_config());
    let collection = &ctx.images.collection().name;

    let vector = {
        use crate::embedding::Embedder;
        FakeEmbedder.embed_image(&png([255, 0, 0], 4, 4)).unwrap()
    };
    let mut payload = crate::store::Payload::new();
    payload.insert("name".into(), json!("Moebius"));
    payload.insert("url".into(), json!("/styles/dark-fantasy"));
    store
        .upsert(
            collection,
            Point {
                id: PointId::from(42),
                vector,
                payload,
            },
        )
        .unwrap();

    let response = ctx
        .images
        .search_by_image(&png([255, 0, 0], 4, 4), None, None)
        .unwrap();
    let hit = &response.recommendations[0];
    assert_eq!(hit.id, "42");
    assert_eq!(
        hit.similarity_aspects,
        vec!["Artist/Style: Moebius", "Art Style: Dark Fantasy"]
    );
}

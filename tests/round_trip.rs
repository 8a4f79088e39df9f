use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use reconcile_doc::{Node, NodeJson, RecreateOptions, Schema, basic_schema, recreate_transform};
use serde_json::{Value, json};

const WORDS: [&str; 8] = ["ab", "cd", " ", "ef ", "quick", " fox", "ñ", "x"];
const MARKS: [&str; 4] = ["em", "strong", "code", "link"];

fn random_marks(rng: &mut SmallRng) -> Vec<Value> {
    MARKS
        .iter()
        .filter(|_| rng.gen_bool(0.2))
        .map(|&mark| match mark {
            "link" => json!({ "type": "link", "attrs": { "href": "https://example.com" } }),
            _ => json!({ "type": mark }),
        })
        .collect()
}

fn random_inline(rng: &mut SmallRng) -> Value {
    match rng.gen_range(0..6) {
        0 => json!({
            "type": "image",
            "attrs": { "src": format!("{}.png", rng.gen_range(0..3)), "alt": (["a", "b"][rng.gen_range(0..2)]) },
            "marks": random_marks(rng),
        }),
        1 => json!({ "type": "hard_break" }),
        _ => {
            let text: String = (0..rng.gen_range(1..4))
                .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
                .collect();
            json!({ "type": "text", "text": text, "marks": random_marks(rng) })
        }
    }
}

fn random_textblock(rng: &mut SmallRng) -> Value {
    let content: Vec<Value> = (0..rng.gen_range(0..4)).map(|_| random_inline(rng)).collect();
    if rng.gen_bool(0.5) {
        json!({ "type": "paragraph", "content": content })
    } else {
        json!({ "type": "heading", "attrs": { "level": rng.gen_range(1..=3) }, "content": content })
    }
}

fn random_block(rng: &mut SmallRng, depth: usize) -> Value {
    if depth < 2 && rng.gen_bool(0.25) {
        let content: Vec<Value> = (0..rng.gen_range(1..3))
            .map(|_| random_block(rng, depth + 1))
            .collect();
        json!({ "type": "blockquote", "content": content })
    } else {
        random_textblock(rng)
    }
}

fn random_doc(schema: &Schema, rng: &mut SmallRng) -> Node {
    let content: Vec<Value> = (0..rng.gen_range(1..4)).map(|_| random_block(rng, 0)).collect();
    let json: NodeJson = serde_json::from_value(json!({ "type": "doc", "content": content }))
        .expect("Generated document has the JSON shape of a node");
    let doc = Node::from_json(schema, &json).expect("Generated document parses");
    doc.check().expect("Generated document is valid");
    doc
}

fn all_options() -> [RecreateOptions; 3] {
    [
        RecreateOptions::default(),
        RecreateOptions {
            complex_steps: false,
            ..RecreateOptions::default()
        },
        RecreateOptions {
            word_diffs: true,
            ..RecreateOptions::default()
        },
    ]
}

#[test]
fn test_random_documents_round_trip() {
    let schema = basic_schema().unwrap();

    for seed in 0..400 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let from = random_doc(&schema, &mut rng);
        let to = random_doc(&schema, &mut rng);

        for options in all_options() {
            let tr = recreate_transform(&from, &to, &options)
                .unwrap_or_else(|err| panic!("seed {seed} with {options:?}: {err}"));
            assert_eq!(tr.doc(), &to, "seed {seed} with {options:?}");

            let replayed = tr
                .steps()
                .iter()
                .try_fold(from.clone(), |doc, step| step.apply(&doc))
                .unwrap_or_else(|err| panic!("seed {seed} with {options:?}: {err}"));
            assert_eq!(replayed, to, "seed {seed} with {options:?}");
        }
    }
}

#[test]
fn test_random_documents_to_themselves() {
    let schema = basic_schema().unwrap();

    for seed in 0..100 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let doc = random_doc(&schema, &mut rng);

        for options in all_options() {
            let tr = recreate_transform(&doc, &doc, &options).unwrap();
            assert!(tr.steps().is_empty(), "seed {seed} with {options:?}");
        }
    }
}

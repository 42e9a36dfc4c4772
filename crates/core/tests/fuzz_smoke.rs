//! Fuzz smoke tests for the clause interpreter, resolver and decoder.
//!
//! Random declaration trees, clause strings and buffers are checked against
//! the structural properties every layout and decode must satisfy, and must
//! never panic.
//!
//! No external crate dependencies are used; a simple deterministic PRNG
//! provides reproducible randomness.

mod common;

use copylens_core::{
    Declaration, Repeat, ResolvedLayout, Value, ValueCategory, codes, decode, interpret,
    layout_to_pretty_json, resolve,
};

// ─── Simple deterministic PRNG (LCG) ────────────────────────────────────────

struct SimpleRng(u64);

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range(&mut self, max: usize) -> usize {
        ((self.next() >> 33) as usize) % max
    }

    fn gen_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| (self.next() >> 40) as u8).collect()
    }
}

// ─── Generators ─────────────────────────────────────────────────────────────

fn gen_clause(rng: &mut SimpleRng) -> String {
    let n = 1 + rng.gen_range(8);
    match rng.gen_range(10) {
        0 | 1 => format!("PIC X({n})"),
        2 => format!("PIC 9({n})"),
        3 => format!("PIC S9({n})V9(2) COMP-3"),
        4 => format!("PIC S9({n})"),
        5 => format!("PIC S9({n}) SIGN LEADING SEPARATE"),
        6 => format!("PIC 9({n}) USAGE IS PACKED-DECIMAL"),
        7 => "USAGE COMP-1".to_string(),
        8 => "PIC S9(4) COMP".to_string(),
        _ => format!("PIC Z({n})9"),
    }
}

fn gen_children(rng: &mut SimpleRng, depth: usize, next_name: &mut usize) -> Vec<Declaration> {
    let count = 1 + rng.gen_range(4);
    let mut children: Vec<Declaration> = Vec::with_capacity(count);
    for i in 0..count {
        *next_name += 1;
        let name = format!("F{next_name}");
        let level = 5 * (depth as u8 + 1);
        let mut child = if depth < 3 && rng.gen_range(4) == 0 {
            Declaration::group(level, &name, gen_children(rng, depth + 1, next_name))
        } else {
            Declaration::elementary(level, &name, &gen_clause(rng))
        };
        if rng.gen_range(6) == 0 {
            child = child.with_occurs(1 + rng.gen_range(4) as u32);
        } else if i > 0 && rng.gen_range(5) == 0 {
            let target = children[i - 1].name.as_named().unwrap_or("F0").to_string();
            child = child.with_redefines(&target);
        }
        children.push(child);
    }
    children
}

fn gen_record(rng: &mut SimpleRng) -> Declaration {
    let mut next_name = 0;
    Declaration::group(1, "REC", gen_children(rng, 0, &mut next_name))
}

// ─── Invariant checking ─────────────────────────────────────────────────────

fn assert_layout_invariants(layout: &ResolvedLayout) {
    for field in layout.fields() {
        match (&field.category, &field.repeat) {
            (ValueCategory::Group, None) => {
                let sum: usize = layout
                    .children(layout.field_id(&field.path).unwrap())
                    .filter(|c| c.alias_of.is_none())
                    .map(|c| c.width)
                    .sum();
                assert_eq!(sum, field.width, "children of {} do not fill it", field.path);
            }
            (
                ValueCategory::Group,
                Some(Repeat::Fixed {
                    count,
                    materialized,
                    element_width,
                }),
            ) => {
                assert_eq!(field.width, *count as usize * element_width, "{}", field.path);
                assert_eq!(field.children.len(), *materialized as usize);
                for (i, &child) in field.children.iter().enumerate() {
                    let element = layout.field(child);
                    assert_eq!(element.offset, field.offset + i * element_width, "{}", element.path);
                    assert_eq!(element.width, *element_width);
                    assert_eq!(element.path, format!("{}[{}]", field.path, i + 1));
                }
            }
            _ => {}
        }

        if let Some(target) = &field.alias_of {
            let target = layout
                .get(target)
                .unwrap_or_else(|| panic!("alias target {target} of {} missing", field.path));
            assert_eq!(field.offset, target.offset, "alias {}", field.path);
        }

        if let Some(parent) = field.parent {
            assert!(layout.field(parent).children.contains(&layout.field_id(&field.path).unwrap()));
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[test]
fn random_layouts_hold_invariants() {
    let mut rng = SimpleRng::new(0xC0B0_1959);
    for _ in 0..400 {
        let decl = gen_record(&mut rng);
        let layout = resolve(&decl);
        assert_layout_invariants(&layout);
    }
}

#[test]
fn random_layouts_are_deterministic() {
    let mut rng = SimpleRng::new(7);
    for _ in 0..100 {
        let decl = gen_record(&mut rng);
        let a = resolve(&decl);
        let b = resolve(&decl);
        assert_eq!(a, b);
        assert_eq!(layout_to_pretty_json(&a), layout_to_pretty_json(&b));
    }
}

#[test]
fn exact_width_never_reports_too_short() {
    let mut rng = SimpleRng::new(42);
    for _ in 0..300 {
        let layout = resolve(&gen_record(&mut rng));
        let buf = rng.gen_bytes(layout.width());
        let result = decode(&layout, &buf);
        assert!(
            result.diagnostics.iter().all(|d| d.id != codes::BUFFER_TOO_SHORT),
            "{:?}",
            result.diagnostics
        );
    }
}

#[test]
fn truncation_degrades_only_the_tail() {
    let mut rng = SimpleRng::new(1234);
    for _ in 0..300 {
        let layout = resolve(&gen_record(&mut rng));
        if layout.width() < 2 {
            continue;
        }
        let full = rng.gen_bytes(layout.width());
        let cut = 1 + rng.gen_range(layout.width() - 1);
        let whole = decode(&layout, &full);
        let short = decode(&layout, &full[..cut]);

        for (path, value) in short.tree.leaves() {
            let field = layout.get(path).unwrap();
            if field.category == ValueCategory::Unsupported {
                assert!(value.is_unknown());
            } else if field.end() <= cut {
                assert_eq!(Ok(value), whole.tree.value(path), "{path} before the cut");
            } else if field.offset >= cut && field.width > 0 {
                assert!(
                    matches!(value, Value::Unknown(u) if u.reason == codes::BUFFER_TOO_SHORT),
                    "{path} after the cut: {value:?}"
                );
            }
        }
    }
}

#[test]
fn random_buffers_never_panic() {
    let mut rng = SimpleRng::new(99);
    for _ in 0..300 {
        let layout = resolve(&gen_record(&mut rng));
        let len = rng.gen_range(layout.width() * 2 + 2);
        let buf = rng.gen_bytes(len);
        let result = decode(&layout, &buf);
        assert_eq!(result.tree.fingerprint(), layout.fingerprint());
        assert_eq!(result.tree.nodes()[0].path, "REC");
    }
}

#[test]
fn random_clause_text_never_panics() {
    const ALPHABET: &[u8] = b"PICSX9V()ZCOMP-3 .,'\"ASIGNLEADTR0123456789";
    let mut rng = SimpleRng::new(2024);
    for _ in 0..5_000 {
        let len = rng.gen_range(24);
        let clause: String = (0..len)
            .map(|_| char::from(ALPHABET[rng.gen_range(ALPHABET.len())]))
            .collect();
        match interpret(&clause) {
            Ok(spec) => assert!(spec.width > 0, "{clause:?} resolved to zero width"),
            Err(e) => assert_eq!(e.clause, clause),
        }
    }
}

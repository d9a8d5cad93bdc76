use proptest::prelude::*;

use clayout::layout::{MemberDeclaration, TypeRegistry, align_up, parse, render};

const TYPES: &[&str] = &["uint8_t", "int16_t", "uint32_t", "float", "double", "int64_t"];

fn declarations(
    registry: &TypeRegistry,
    specs: &[(usize, usize, u32, usize)],
) -> Vec<MemberDeclaration> {
    specs
        .iter()
        .enumerate()
        .map(|(index, &(ty, length, align_pow, offset))| {
            let info = registry.lookup(TYPES[ty]).expect("prelude type");
            MemberDeclaration {
                name: format!("m{index}"),
                type_name: info.name.clone(),
                ty: info.record.clone(),
                element_size: info.size,
                size: info.size * length,
                length,
                alignment: 1 << align_pow,
                offset,
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn parse_inverts_render(
        specs in prop::collection::vec((0..TYPES.len(), 1usize..6, 0u32..6, 0usize..1024), 1..16)
    ) {
        let registry = TypeRegistry::new();
        let members = declarations(&registry, &specs);
        let parsed = parse(&registry, &render(&members)).expect("rendered text parses");
        prop_assert_eq!(parsed, members);
    }

    #[test]
    fn sequential_offsets_respect_alignment(
        picks in prop::collection::vec((0..TYPES.len(), 1usize..4), 1..12)
    ) {
        let registry = TypeRegistry::new();
        let text = picks
            .iter()
            .enumerate()
            .map(|(index, &(ty, length))| format!("f{index}: {}[{length}]", TYPES[ty]))
            .collect::<Vec<_>>()
            .join("; ");
        let members = parse(&registry, &text).expect("generated text parses");
        let mut end = 0;
        for member in &members {
            prop_assert_eq!(member.offset % member.alignment, 0);
            prop_assert_eq!(member.offset, align_up(end, member.alignment));
            end = member.end();
        }
    }
}

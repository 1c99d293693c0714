//! The signature table for every wrapper method.

use rogue_types::abi;
use rogue_types::{InterfaceTable, MethodKind, MethodSignature, Param, TypeSignature, ValueKind};

fn method(name: &str, export: &str, params: Vec<Param>, returns: ValueKind) -> MethodSignature {
    MethodSignature {
        name: name.to_string(),
        export: export.to_string(),
        kind: MethodKind::Method,
        params,
        returns,
    }
}

fn constructor(export: &str, params: Vec<Param>) -> MethodSignature {
    MethodSignature {
        name: "new".to_string(),
        export: export.to_string(),
        kind: MethodKind::Constructor,
        params,
        returns: ValueKind::Handle,
    }
}

fn destructor(export: &str) -> MethodSignature {
    MethodSignature {
        name: "free".to_string(),
        export: export.to_string(),
        kind: MethodKind::Destructor,
        params: Vec::new(),
        returns: ValueKind::Void,
    }
}

fn xy() -> Vec<Param> {
    vec![
        Param::new("x", ValueKind::Number),
        Param::new("y", ValueKind::Number),
    ]
}

fn player_signature() -> TypeSignature {
    use ValueKind::*;
    TypeSignature {
        name: "PlayerCore".to_string(),
        methods: vec![
            constructor(
                abi::PLAYERCORE_NEW,
                vec![
                    Param::new("x", Number),
                    Param::new("y", Number),
                    Param::new("name", String),
                    Param::new("display", Object),
                ],
            ),
            destructor(abi::PLAYERCORE_FREE),
            method("x", abi::PLAYERCORE_X, vec![], Number),
            method("y", abi::PLAYERCORE_Y, vec![], Number),
            method("hitpoints", abi::PLAYERCORE_HITPOINTS, vec![], Number),
            method("name", abi::PLAYERCORE_NAME, vec![], String),
            method("move_to", abi::PLAYERCORE_MOVE_TO, xy(), Void),
            method("draw", abi::PLAYERCORE_DRAW, vec![], Void),
            method(
                "take_damage",
                abi::PLAYERCORE_TAKE_DAMAGE,
                vec![Param::new("hits", Number)],
                Number,
            ),
            method("stats", abi::PLAYERCORE_STATS, vec![], Object),
            method("emit_stats", abi::PLAYERCORE_EMIT_STATS, vec![], Void),
        ],
    }
}

fn engine_signature() -> TypeSignature {
    use ValueKind::*;
    let player_xy = || {
        let mut params = vec![Param::handle("player", "PlayerCore")];
        params.extend(xy());
        params
    };
    let mut dig = xy();
    dig.push(Param::new("value", Number));

    TypeSignature {
        name: "Engine".to_string(),
        methods: vec![
            constructor(abi::ENGINE_NEW, vec![Param::new("display", Object)]),
            destructor(abi::ENGINE_FREE),
            method("on_dig", abi::ENGINE_ON_DIG, dig, Void),
            method("draw_map", abi::ENGINE_DRAW_MAP, vec![], Void),
            method("redraw_at", abi::ENGINE_REDRAW_AT, xy(), Void),
            method("place_box", abi::ENGINE_PLACE_BOX, xy(), Void),
            method("mark_wasmprize", abi::ENGINE_MARK_WASMPRIZE, xy(), Void),
            method("open_box", abi::ENGINE_OPEN_BOX, player_xy(), Void),
            method("move_player", abi::ENGINE_MOVE_PLAYER, player_xy(), Void),
            method("free_cell", abi::ENGINE_FREE_CELL, xy(), Boolean),
        ],
    }
}

/// Every exported type and method the host wrappers call.
pub fn interface() -> InterfaceTable {
    InterfaceTable {
        types: vec![player_signature(), engine_signature()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_export_is_listed_once() {
        let table = interface();
        let mut exports: Vec<&str> = table.exports().collect();
        let total = exports.len();
        exports.sort_unstable();
        exports.dedup();
        assert_eq!(exports.len(), total);
        assert_eq!(total, 21);
    }

    #[test]
    fn constructor_widths_match_the_module() {
        let table = interface();
        let (_, new) = table.find_export(abi::PLAYERCORE_NEW).unwrap();
        assert_eq!(new.abi_param_count(), 5);
        let (ty, open) = table.find_export(abi::ENGINE_OPEN_BOX).unwrap();
        assert_eq!(ty.name, "Engine");
        assert_eq!(open.abi_param_count(), 4);
        let (_, name) = table.find_export(abi::PLAYERCORE_NAME).unwrap();
        assert_eq!(name.abi_param_count(), 2);
    }

    #[test]
    fn declarations_mention_handle_types() {
        let text = interface().render_declarations();
        assert!(text.contains("export class PlayerCore {"));
        assert!(text.contains("  constructor(x: number, y: number, name: string, display: any);"));
        assert!(text.contains("  open_box(player: PlayerCore, x: number, y: number): void;"));
        assert!(text.contains("  free_cell(x: number, y: number): boolean;"));
    }
}

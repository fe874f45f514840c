#[cfg(test)]
mod tests {
    use crate::isa::Opcode;

    macro_rules! collect_isa {
        (
            $( $(#[$doc:meta])* $name:ident = $opcode:expr, $mnemonic:literal => [ $( $field:ident : $kind:ident ),* $(,)? ] ),* $(,)?
        ) => {
            vec![ $( (Opcode::$name, $opcode as u8, $mnemonic, (&[$( stringify!($field) ),*] as &[&str]).len()) ),* ]
        };
    }

    fn isa_table() -> Vec<(Opcode, u8, &'static str, usize)> {
        crate::for_each_instruction!(collect_isa)
    }

    #[test]
    fn opcodes_and_mnemonics_are_unique() {
        let table = isa_table();
        for (i, (_, num_a, mn_a, _)) in table.iter().enumerate() {
            for (_, num_b, mn_b, _) in &table[i + 1..] {
                assert_ne!(num_a, num_b, "duplicate opcode number {num_a}");
                assert_ne!(mn_a, mn_b, "duplicate mnemonic {mn_a}");
            }
        }
    }

    #[test]
    fn generated_tables_match_definitions() {
        let table = isa_table();
        for (opcode, num, mnemonic, arity) in &table {
            assert_eq!(Opcode::try_from(*num).as_ref(), Ok(opcode));
            assert_eq!(opcode.mnemonic(), *mnemonic);
            assert_eq!(opcode.arity(), *arity);
        }
    }
}

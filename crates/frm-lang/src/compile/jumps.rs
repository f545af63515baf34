//! The control-flow resolver.
//!
//! After flattening, each structural jump record must learn the concrete
//! index of its compiled jump opcode and the load/store cursor values at
//! that point, so that taking the jump also rewinds the interpreter
//! bookkeeping. A backward pairing pass then matches every `endif` with
//! its `if`/`elseif`/`else` chain and fills in destinations.

use frm_core::JumpKind;
use frm_vm::program::{Instr, JumpRecord};

/// Cursor snapshot of one compiled jump opcode.
#[derive(Copy, Clone, Debug)]
struct JumpSite {
    op: usize,
    lod: usize,
    sto: usize,
}

/// Resolve the ordered structural records against the compiled opcode
/// stream. Fails on any structural inconsistency the prescanner could not
/// see (count mismatch, wrong terminal kinds).
pub fn resolve(instrs: &[Instr], kinds: &[JumpKind]) -> Result<Vec<JumpRecord>, ()> {
    let sites = locate_sites(instrs, kinds)?;

    if kinds.first() != Some(&JumpKind::If) || kinds.last() != Some(&JumpKind::EndIf) {
        return Err(());
    }

    let mut records: Vec<JumpRecord> = kinds
        .iter()
        .map(|&kind| JumpRecord {
            kind,
            dest_op: 0,
            dest_lod: 0,
            dest_sto: 0,
            dest_jump: 0,
        })
        .collect();

    let mut i = records.len();
    while i > 0 {
        i -= 1;
        i = fill_if_group(i, kinds, &sites, &mut records)?;
    }
    Ok(records)
}

/// Walk the opcode stream once, pairing each structural record with its
/// compiled jump instruction and capturing the cursor values there.
fn locate_sites(instrs: &[Instr], kinds: &[JumpKind]) -> Result<Vec<JumpSite>, ()> {
    let mut sites = Vec::with_capacity(kinds.len());
    let mut i = 0usize;
    let mut loadcount = 0usize;
    let mut storecount = 0usize;
    let mut checkforelse = false;
    let mut wanted: Option<Instr> = None;

    for (op, &instr) in instrs.iter().enumerate() {
        if wanted.is_none() && i < kinds.len() {
            wanted = Some(match kinds[i] {
                JumpKind::If => Instr::JumpOnFalse,
                JumpKind::ElseIf => {
                    checkforelse = !checkforelse;
                    if checkforelse {
                        Instr::Jump
                    } else {
                        Instr::JumpOnFalse
                    }
                }
                JumpKind::Else => Instr::Jump,
                JumpKind::EndIf => Instr::JumpLabel,
            });
        }
        if instr == Instr::Lod {
            loadcount += 1;
        } else if instr == Instr::Sto {
            storecount += 1;
        } else if Some(instr) == wanted {
            sites.push(JumpSite {
                op,
                lod: loadcount,
                sto: storecount,
            });
            i += 1;
            wanted = None;
        }
    }

    if i != kinds.len() {
        return Err(());
    }
    Ok(sites)
}

/// Pair the `endif` at `endif_index` with its chain, filling in each
/// record's destination. Returns the index of the matching `if`.
fn fill_if_group(
    endif_index: usize,
    kinds: &[JumpKind],
    sites: &[JumpSite],
    records: &mut [JumpRecord],
) -> Result<usize, ()> {
    let mut ljp = endif_index; // last jump processed
    let mut i = endif_index;
    while i > 0 {
        i -= 1;
        match kinds[i] {
            JumpKind::If => {
                set_dest(&mut records[i], &sites[ljp], ljp + 1);
                return Ok(i);
            }
            JumpKind::ElseIf => {
                // the conditional half of the pair
                set_dest(&mut records[i], &sites[ljp], ljp + 1);
                // then the close-out jump of the prior branch
                if i == 0 {
                    return Err(());
                }
                i -= 1;
                set_dest(&mut records[i], &sites[endif_index], endif_index + 1);
                ljp = i;
            }
            JumpKind::Else => {
                set_dest(&mut records[i], &sites[endif_index], endif_index + 1);
                ljp = i;
            }
            JumpKind::EndIf => {
                i = fill_if_group(i, kinds, sites, records)?;
            }
        }
    }
    Err(())
}

fn set_dest(record: &mut JumpRecord, site: &JumpSite, dest_jump: usize) {
    record.dest_op = site.op;
    record.dest_lod = site.lod;
    record.dest_sto = site.sto;
    record.dest_jump = dest_jump;
}

#[cfg(test)]
mod tests {
    use super::*;
    use frm_core::Complex;
    use frm_vm::program::TrigFn;

    use crate::compile::parser::{parse, Capacities, ParserConfig};

    fn compile(prepared: &str) -> (Vec<Instr>, Vec<JumpKind>) {
        let cfg = ParserConfig {
            trig: TrigFn::DEFAULT_SLOTS,
            mod_instr: Instr::Mod,
            fixed_math: false,
            predef_init: [Complex::ZERO; 19],
        };
        let out = parse(prepared, &cfg, Capacities::generous()).unwrap();
        (out.instrs, out.jump_kinds)
    }

    #[test]
    fn if_endif_destinations() {
        let (instrs, kinds) = compile("if(real(z)>0),z=z+1,endif");
        let records = resolve(&instrs, &kinds).unwrap();
        assert_eq!(records.len(), 2);
        // the if's conditional jump lands on the endif's label
        let label = instrs.iter().position(|i| *i == Instr::JumpLabel).unwrap();
        assert_eq!(records[0].dest_op, label);
        assert_eq!(records[0].dest_jump, 2);
        // every destination lies inside the program
        for r in records.iter() {
            assert!(r.dest_op < instrs.len());
        }
    }

    #[test]
    fn if_else_endif_destinations() {
        let (instrs, kinds) = compile("if(real(z)>0),z=z+1,else,z=z-1,endif");
        let records = resolve(&instrs, &kinds).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            kinds,
            vec![JumpKind::If, JumpKind::Else, JumpKind::EndIf]
        );
        // the if jumps to the else's unconditional jump; execution resumes
        // one instruction past it
        let else_jump = instrs.iter().position(|i| *i == Instr::Jump).unwrap();
        assert_eq!(records[0].dest_op, else_jump);
        assert_eq!(records[0].dest_jump, 2);
        // the else jumps to the endif label
        let label = instrs.iter().position(|i| *i == Instr::JumpLabel).unwrap();
        assert_eq!(records[1].dest_op, label);
        for r in records.iter() {
            assert!(r.dest_op < instrs.len());
        }
    }

    #[test]
    fn elseif_resolves_both_halves() {
        let (instrs, kinds) = compile("if(1),z=1,elseif(2),z=2,else,z=3,endif");
        let records = resolve(&instrs, &kinds).unwrap();
        assert_eq!(records.len(), 5); // if, elseif pair, else, endif
        let label = instrs.iter().position(|i| *i == Instr::JumpLabel).unwrap();
        // close-out jumps all land on the endif label
        assert_eq!(records[1].dest_op, label);
        assert_eq!(records[3].dest_op, label);
        // the if lands on the elseif's close-out jump
        assert_eq!(records[0].dest_op, instrs.iter().position(|i| *i == Instr::Jump).unwrap());
        for r in records.iter() {
            assert!(r.dest_op < instrs.len());
        }
    }

    #[test]
    fn nested_if_pairs_inner_first() {
        let (instrs, kinds) = compile("if(1),if(2),z=1,endif,endif");
        let records = resolve(&instrs, &kinds).unwrap();
        assert_eq!(records.len(), 4);
        let labels: Vec<usize> = instrs
            .iter()
            .enumerate()
            .filter(|(_, i)| **i == Instr::JumpLabel)
            .map(|(n, _)| n)
            .collect();
        assert_eq!(labels.len(), 2);
        // inner if -> inner endif, outer if -> outer endif
        assert_eq!(records[1].dest_op, labels[0]);
        assert_eq!(records[0].dest_op, labels[1]);
    }

    #[test]
    fn load_cursor_snapshots_count_preceding_loads() {
        let (instrs, kinds) = compile("if(real(z)>0),z=z+1,endif");
        let records = resolve(&instrs, &kinds).unwrap();
        // at the endif label, all loads of both sections have executed
        let total_loads = instrs.iter().filter(|i| **i == Instr::Lod).count();
        assert_eq!(records[0].dest_lod, total_loads);
    }

    #[test]
    fn sequential_groups_resolve_independently() {
        let (instrs, kinds) =
            compile("if(1),z=1,endif,if(2),z=2,endif");
        let records = resolve(&instrs, &kinds).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records[0].dest_op < records[2].dest_op);
    }

    #[test]
    fn mismatched_structure_is_rejected() {
        // records fabricated out of order: else terminal instead of endif
        let (instrs, _) = compile("if(1),z=1,endif");
        let bad = vec![JumpKind::If, JumpKind::Else];
        assert!(resolve(&instrs, &bad).is_err());
    }
}

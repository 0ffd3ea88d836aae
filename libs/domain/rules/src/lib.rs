// [libs/domain/rules/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DIGIT-PATTERN RULE ENGINE (V1.0)
 * CLASIFICACIÓN: DOMAIN (ESTRATO L2)
 * RESPONSABILIDAD: SALTO DE RANGOS INVÁLIDOS PARA EL PICKER SECUENCIAL
 *
 * Four overlapping-window constraints over the decimal representation
 * of a candidate integer. Used only by the sequential-with-rules chunk
 * picker to skip past sub-intervals that violate domain constraints —
 * this crate knows nothing about chunks, tiles, or the ledger.
 * =================================================================
 */

mod engine;
mod errors;

pub use engine::next_valid_ge;
pub use errors::RuleError;

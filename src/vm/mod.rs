//! Interpreter for generated routines.
//!
//! [`Machine`] executes [`Routine`]s over 256-bit [`Word`]s with a growable
//! memory, read-only call-data and a storage map. It exists so generated
//! encoders and decoders can be run and checked byte for byte; it does not
//! model gas, calls between contracts or return data.

mod error;
mod memory;
mod word;

pub use error::Halt;
pub use memory::{CallData, Memory, align_to};
pub use word::Word;

use std::rc::Rc;

use rustc_hash::FxHashMap;
use sha3::{Digest, Keccak256 as Keccak};

use crate::logging::{debug, trace, warn};
use crate::yul::{Builtin, Expr, Routine, Stmt};

/// Slot of the free memory pointer.
pub const FREE_MEMORY_POINTER: u64 = 0x40;
/// Initial value of the free memory pointer.
pub const INITIAL_FREE_MEMORY: u64 = 0x80;

const DEFAULT_MEMORY_LIMIT: usize = 1 << 24;
const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Variables of one routine invocation, innermost scope last.
#[derive(Default)]
struct Frame {
    scopes: Vec<FxHashMap<String, Word>>,
}

impl Frame {
    fn declare(&mut self, name: &str, value: Word) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn get(&self, name: &str) -> Result<Word, Halt> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| Halt::UnknownVariable(name.to_string()))
    }

    fn set(&mut self, name: &str, value: Word) -> Result<(), Halt> {
        let slot = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .ok_or_else(|| Halt::UnknownVariable(name.to_string()))?;
        *slot = value;
        Ok(())
    }
}

/// Executes routines against memory, call-data and storage.
pub struct Machine {
    routines: FxHashMap<String, Rc<Routine>>,
    memory: Memory,
    calldata: CallData,
    storage: FxHashMap<Word, Word>,
    steps: u64,
    step_limit: u64,
}

impl Machine {
    /// A machine that knows `routines`. The free memory pointer starts at 0x80.
    pub fn new(routines: impl IntoIterator<Item = Routine>) -> Self {
        let mut machine = Self {
            routines: routines
                .into_iter()
                .map(|r| (r.name.clone(), Rc::new(r)))
                .collect(),
            memory: Memory::new(DEFAULT_MEMORY_LIMIT),
            calldata: CallData::default(),
            storage: FxHashMap::default(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        };
        machine.reset_memory();
        machine
    }

    pub fn with_calldata(mut self, data: impl Into<CallData>) -> Self {
        self.calldata = data.into();
        self
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory = Memory::new(limit);
        self.reset_memory();
        self
    }

    fn reset_memory(&mut self) {
        // The limit is always large enough for the pointer slot unless set below 0x60.
        let _ = self.memory.store(
            &Word::from(FREE_MEMORY_POINTER),
            &Word::from(INITIAL_FREE_MEMORY),
        );
    }

    pub fn add_routine(&mut self, routine: Routine) {
        self.routines.insert(routine.name.clone(), Rc::new(routine));
    }

    pub fn set_calldata(&mut self, data: impl Into<CallData>) {
        self.calldata = data.into();
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Current value of the free memory pointer.
    pub fn free_memory_pointer(&mut self) -> Result<Word, Halt> {
        self.memory.load(&Word::from(FREE_MEMORY_POINTER))
    }

    /// Copies `bytes` to fresh memory (bumping the free memory pointer) and returns their offset.
    pub fn allocate(&mut self, bytes: &[u8]) -> Result<Word, Halt> {
        let ptr = self.free_memory_pointer()?;
        self.memory.write(&ptr, bytes)?;
        let end = ptr.add(&Word::from(align_to(bytes.len(), 32)));
        self.memory.store(&Word::from(FREE_MEMORY_POINTER), &end)?;
        Ok(ptr)
    }

    pub fn sload(&self, slot: &Word) -> Word {
        self.storage.get(slot).cloned().unwrap_or_default()
    }

    pub fn sstore(&mut self, slot: Word, value: Word) {
        if value.is_zero() {
            self.storage.remove(&slot);
        } else {
            self.storage.insert(slot, value);
        }
    }

    /// Steps executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Calls routine or builtin `name` with `args`.
    pub fn call(&mut self, name: &str, args: &[Word]) -> Result<Vec<Word>, Halt> {
        debug!(routine = name, args = args.len(), "calling routine");
        let result = self.invoke(name, args.to_vec());
        #[cfg(feature = "logging")]
        if let Err(halt) = &result {
            debug!(routine = name, halt = %halt, steps = self.steps, "routine halted");
        }
        result
    }

    fn invoke(&mut self, name: &str, args: Vec<Word>) -> Result<Vec<Word>, Halt> {
        if let Some(builtin) = Builtin::from_name(name) {
            return self.builtin(builtin, args);
        }
        let routine = self
            .routines
            .get(name)
            .cloned()
            .ok_or_else(|| Halt::UnknownRoutine(name.to_string()))?;
        if routine.params.len() != args.len() {
            return Err(Halt::Arity {
                name: name.to_string(),
                expected: routine.params.len(),
                got: args.len(),
            });
        }
        trace!(routine = name, "entering routine");
        let mut frame = Frame {
            scopes: vec![FxHashMap::default()],
        };
        for (param, arg) in routine.params.iter().zip(args) {
            frame.declare(param, arg);
        }
        for ret in &routine.returns {
            frame.declare(ret, Word::zero());
        }
        self.block(&routine.body, &mut frame)?;
        routine.returns.iter().map(|r| frame.get(r)).collect()
    }

    fn step(&mut self) -> Result<(), Halt> {
        self.steps += 1;
        if self.steps > self.step_limit {
            warn!(limit = self.step_limit, "step limit reached");
            return Err(Halt::StepLimit(self.step_limit));
        }
        Ok(())
    }

    fn block(&mut self, body: &[Stmt], frame: &mut Frame) -> Result<(), Halt> {
        frame.scopes.push(FxHashMap::default());
        for stmt in body {
            self.stmt(stmt, frame)?;
        }
        frame.scopes.pop();
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<(), Halt> {
        self.step()?;
        match stmt {
            Stmt::Let(names, value) => {
                let values = match value {
                    Some(e) => self.eval_n(e, names.len(), frame)?,
                    None => vec![Word::zero(); names.len()],
                };
                for (name, value) in names.iter().zip(values) {
                    frame.declare(name, value);
                }
            }
            Stmt::Assign(names, value) => {
                let values = self.eval_n(value, names.len(), frame)?;
                for (name, value) in names.iter().zip(values) {
                    frame.set(name, value)?;
                }
            }
            Stmt::Expr(e) => {
                self.eval(e, frame)?;
            }
            Stmt::If(cond, body) => {
                if !self.eval_one(cond, frame)?.is_zero() {
                    self.block(body, frame)?;
                }
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let value = self.eval_one(scrutinee, frame)?;
                let hit = cases
                    .iter()
                    .find(|(case, _)| Word::new(case.clone()) == value)
                    .map(|(_, body)| body)
                    .or(default.as_ref());
                if let Some(body) = hit {
                    self.block(body, frame)?;
                }
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                frame.scopes.push(FxHashMap::default());
                for s in init {
                    self.stmt(s, frame)?;
                }
                loop {
                    self.step()?;
                    if self.eval_one(cond, frame)?.is_zero() {
                        break;
                    }
                    self.block(body, frame)?;
                    for s in post {
                        self.stmt(s, frame)?;
                    }
                }
                frame.scopes.pop();
            }
            Stmt::Block(body) => self.block(body, frame)?,
            Stmt::Comment(_) => {}
        }
        Ok(())
    }

    fn eval_n(&mut self, e: &Expr, n: usize, frame: &mut Frame) -> Result<Vec<Word>, Halt> {
        let values = self.eval(e, frame)?;
        if values.len() != n {
            return Err(Halt::Arity {
                name: expr_name(e),
                expected: n,
                got: values.len(),
            });
        }
        Ok(values)
    }

    fn eval_one(&mut self, e: &Expr, frame: &mut Frame) -> Result<Word, Halt> {
        let mut values = self.eval_n(e, 1, frame)?;
        values.pop().ok_or_else(|| Halt::Arity {
            name: expr_name(e),
            expected: 1,
            got: 0,
        })
    }

    fn eval(&mut self, e: &Expr, frame: &mut Frame) -> Result<Vec<Word>, Halt> {
        match e {
            Expr::Number(value) => Ok(vec![Word::new(value.clone())]),
            Expr::Ident(name) => Ok(vec![frame.get(name)?]),
            Expr::Call(name, args) => {
                // Arguments are evaluated right to left.
                let mut values = Vec::with_capacity(args.len());
                for arg in args.iter().rev() {
                    values.push(self.eval_one(arg, frame)?);
                }
                values.reverse();
                self.invoke(name, values)
            }
        }
    }

    fn builtin(&mut self, op: Builtin, args: Vec<Word>) -> Result<Vec<Word>, Halt> {
        use Builtin::*;
        if args.len() != op.arity() {
            return Err(Halt::Arity {
                name: format!("{:?}", op).to_lowercase(),
                expected: op.arity(),
                got: args.len(),
            });
        }
        let zero = Word::zero();
        let a = args.first().unwrap_or(&zero);
        let b = args.get(1).unwrap_or(&zero);
        let c = args.get(2).unwrap_or(&zero);
        let value = match op {
            Add => a.add(b),
            Sub => a.sub(b),
            Mul => a.mul(b),
            Div => a.div(b),
            Mod => a.rem(b),
            And => a.and(b),
            Or => a.or(b),
            Xor => a.xor(b),
            Not => a.not(),
            Shl => b.shl(a),
            Shr => b.shr(a),
            Sar => b.sar(a),
            Lt => Word::from(a < b),
            Gt => Word::from(a > b),
            Slt => Word::from(a.slt(b)),
            Sgt => Word::from(b.slt(a)),
            Eq => Word::from(a == b),
            IsZero => Word::from(a.is_zero()),
            SignExtend => b.signextend(a),
            Byte => b.byte(a),
            Keccak256 => {
                let data = self.memory.read(a, b)?;
                Word::from_be_slice(&Keccak::digest(&data))
            }
            MLoad => self.memory.load(a)?,
            MStore => {
                self.memory.store(a, b)?;
                return Ok(Vec::new());
            }
            MStore8 => {
                self.memory.store_byte(a, b)?;
                return Ok(Vec::new());
            }
            CallDataLoad => self.calldata.load(a),
            CallDataCopy => {
                let len = c.to_usize().ok_or_else(|| Halt::MemoryLimit {
                    offset: a.to_string(),
                    len: c.to_string(),
                    limit: usize::MAX,
                })?;
                if len > 0 {
                    let bytes = self.calldata.read(b, len);
                    self.memory.write(a, &bytes)?;
                }
                return Ok(Vec::new());
            }
            CallDataSize => Word::from(self.calldata.len()),
            SLoad => self.sload(a),
            SStore => {
                self.sstore(a.clone(), b.clone());
                return Ok(Vec::new());
            }
            Revert => return Err(Halt::Revert),
            Invalid => return Err(Halt::Invalid),
        };
        Ok(vec![value])
    }
}

fn expr_name(e: &Expr) -> String {
    match e {
        Expr::Call(name, _) => name.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yul::{assign, call, counted_loop, expr, id, let_, num, revert_if};

    fn sum_routine() -> Routine {
        Routine::new(
            "sum_to",
            &["n"],
            &["total"],
            vec![counted_loop(
                "i",
                id("n"),
                num(1),
                vec![assign("total", call("add", vec![id("total"), id("i")]))],
            )],
        )
    }

    #[test]
    fn runs_loops_and_returns() {
        let mut vm = Machine::new([sum_routine()]);
        assert_eq!(vm.call("sum_to", &[Word::from(5u64)]).unwrap(), vec![Word::from(10u64)]);
    }

    #[test]
    fn step_limit_stops_runaway_loops() {
        let mut vm = Machine::new([sum_routine()]).with_step_limit(50);
        assert_eq!(
            vm.call("sum_to", &[Word::from(1000u64)]),
            Err(Halt::StepLimit(50))
        );
    }

    #[test]
    fn revert_and_errors() {
        let routine = Routine::new(
            "check",
            &["x"],
            &[],
            vec![
                revert_if(call("gt", vec![id("x"), num(10)])),
                let_("y", call("missing", vec![])),
            ],
        );
        let mut vm = Machine::new([routine]);
        assert_eq!(vm.call("check", &[Word::from(11u64)]), Err(Halt::Revert));
        assert_eq!(
            vm.call("check", &[Word::from(1u64)]),
            Err(Halt::UnknownRoutine("missing".into()))
        );
        assert!(matches!(vm.call("check", &[]), Err(Halt::Arity { .. })));
    }

    #[test]
    fn memory_storage_and_hashing() {
        let routine = Routine::new(
            "hash_slot",
            &["slot"],
            &["h"],
            vec![
                expr(call("mstore", vec![num(0), id("slot")])),
                assign("h", call("keccak256", vec![num(0), num(0x20)])),
                expr(call("sstore", vec![id("h"), num(7)])),
            ],
        );
        let mut vm = Machine::new([routine]);
        assert_eq!(vm.free_memory_pointer().unwrap(), Word::from(0x80u64));
        let h = vm.call("hash_slot", &[Word::zero()]).unwrap();
        let expected = "290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563";
        let h = h.first().cloned().unwrap_or_default();
        assert_eq!(hex::encode(h.to_be_bytes()), expected);
        assert_eq!(vm.sload(&h), Word::from(7u64));
    }

    #[test]
    fn hashes_empty_input() {
        let routine = Routine::new(
            "hash_nothing",
            &[],
            &["h"],
            vec![assign("h", call("keccak256", vec![num(0), num(0)]))],
        );
        let h = Machine::new([routine]).call("hash_nothing", &[]).unwrap();
        let h = h.first().cloned().unwrap_or_default();
        assert_eq!(
            hex::encode(h.to_be_bytes()),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}

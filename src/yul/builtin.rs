/// Builtin operations available to routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Sar,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    IsZero,
    SignExtend,
    Byte,
    Keccak256,
    MLoad,
    MStore,
    MStore8,
    CallDataLoad,
    CallDataCopy,
    CallDataSize,
    SLoad,
    SStore,
    Revert,
    Invalid,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        use Builtin::*;
        Some(match name {
            "add" => Add,
            "sub" => Sub,
            "mul" => Mul,
            "div" => Div,
            "mod" => Mod,
            "and" => And,
            "or" => Or,
            "xor" => Xor,
            "not" => Not,
            "shl" => Shl,
            "shr" => Shr,
            "sar" => Sar,
            "lt" => Lt,
            "gt" => Gt,
            "slt" => Slt,
            "sgt" => Sgt,
            "eq" => Eq,
            "iszero" => IsZero,
            "signextend" => SignExtend,
            "byte" => Byte,
            "keccak256" => Keccak256,
            "mload" => MLoad,
            "mstore" => MStore,
            "mstore8" => MStore8,
            "calldataload" => CallDataLoad,
            "calldatacopy" => CallDataCopy,
            "calldatasize" => CallDataSize,
            "sload" => SLoad,
            "sstore" => SStore,
            "revert" => Revert,
            "invalid" => Invalid,
            _ => return None,
        })
    }

    /// Number of arguments.
    pub fn arity(self) -> usize {
        use Builtin::*;
        match self {
            CallDataSize | Invalid => 0,
            Not | IsZero | MLoad | CallDataLoad | SLoad => 1,
            CallDataCopy => 3,
            _ => 2,
        }
    }

    /// Whether the builtin produces a value.
    pub fn returns_value(self) -> bool {
        use Builtin::*;
        !matches!(
            self,
            MStore | MStore8 | CallDataCopy | SStore | Revert | Invalid
        )
    }
}

use crate::ast::BinaryOperator;

/// Binding strength of each binary operator; higher binds tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecedenceTable {
    levels: [u32; 9],
}

impl PrecedenceTable {
    /// The historical ordering of the language:
    /// `+ < - < * < / < % < > < >= < < < <=`.
    ///
    /// Every operator gets its own level and arithmetic ranks below the
    /// comparisons, so `x - 1 < 3` groups as `x - (1 < 3)`.
    pub const fn legacy() -> Self {
        Self {
            levels: [0, 1, 2, 3, 4, 7, 8, 5, 6],
        }
    }

    /// Comparisons lowest, then additive, then multiplicative operators.
    pub const fn conventional() -> Self {
        Self {
            levels: [20, 20, 40, 40, 40, 10, 10, 10, 10],
        }
    }

    pub fn precedence(&self, op: BinaryOperator) -> u32 {
        self.levels[slot(op)]
    }
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        Self::legacy()
    }
}

fn slot(op: BinaryOperator) -> usize {
    match op {
        BinaryOperator::Add => 0,
        BinaryOperator::Sub => 1,
        BinaryOperator::Mul => 2,
        BinaryOperator::Div => 3,
        BinaryOperator::Mod => 4,
        BinaryOperator::Lt => 5,
        BinaryOperator::Lte => 6,
        BinaryOperator::Gt => 7,
        BinaryOperator::Gte => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_table_is_strictly_increasing_in_declared_order() {
        let table = PrecedenceTable::legacy();
        let order = [
            BinaryOperator::Add,
            BinaryOperator::Sub,
            BinaryOperator::Mul,
            BinaryOperator::Div,
            BinaryOperator::Mod,
            BinaryOperator::Gt,
            BinaryOperator::Gte,
            BinaryOperator::Lt,
            BinaryOperator::Lte,
        ];
        for pair in order.windows(2) {
            assert!(
                table.precedence(pair[0]) < table.precedence(pair[1]),
                "{:?} should bind looser than {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn conventional_table_groups_operator_families() {
        let table = PrecedenceTable::conventional();
        assert_eq!(
            table.precedence(BinaryOperator::Add),
            table.precedence(BinaryOperator::Sub)
        );
        assert!(table.precedence(BinaryOperator::Mul) > table.precedence(BinaryOperator::Add));
        assert!(table.precedence(BinaryOperator::Lt) < table.precedence(BinaryOperator::Sub));
    }
}

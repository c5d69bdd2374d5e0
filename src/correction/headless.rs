//! Non-interactive surface: accept the initial fits and commit.

use tracing::info;

use crate::correction::protocol::{FitComputed, InteractiveSurface, SessionHandle};
use crate::domain::ColumnMap;
use crate::error::CorrectionError;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessSurface;

impl InteractiveSurface for HeadlessSurface {
    fn run(
        &mut self,
        columns: &ColumnMap,
        initial: Vec<FitComputed>,
        session: &mut dyn SessionHandle,
    ) -> Result<(), CorrectionError> {
        if initial.is_empty() {
            return Ok(());
        }

        for computed in &initial {
            let nickname = columns
                .get(&computed.column_id)
                .map(|c| c.nickname.as_str())
                .unwrap_or_default();
            info!(
                column_id = %computed.column_id,
                nickname,
                lb = computed.bounds.lb(),
                ub = computed.bounds.ub(),
                "accepting initial fit"
            );
        }

        session.commit()?;
        Ok(())
    }
}

use super::Keeper;
use crate::bank::Bank;
use crate::context::Context;
use crate::error::Result;
use crate::store::KvStore;
use crate::types::GenesisState;
use tracing::info;

impl<B: Bank> Keeper<B> {
    /// Load a validated genesis into an empty module store
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &GenesisState) -> Result<()> {
        genesis.validate()?;

        self.set_params(ctx, &genesis.params)?;
        self.save_current_draw(ctx, &genesis.draw)?;
        self.save_tickets(ctx, &genesis.tickets)?;
        for data in &genesis.historical_draws {
            self.save_historical_draw(ctx, data)?;
        }

        info!(
            "wta genesis loaded: {} tickets, {} historical draws, draw closes at {}",
            genesis.tickets.len(),
            genesis.historical_draws.len(),
            genesis.draw.end_time
        );
        Ok(())
    }

    /// Current module state in genesis form: tickets ascending by id,
    /// history ascending by end time.
    pub fn export_genesis(&self, store: &dyn KvStore) -> Result<GenesisState> {
        Ok(GenesisState::new(
            self.get_current_draw(store)?,
            self.get_tickets(store)?,
            self.get_historical_draws(store)?,
            self.get_params(store)?,
        ))
    }
}

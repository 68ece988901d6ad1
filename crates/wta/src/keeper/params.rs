use super::{read, write, Keeper};
use crate::bank::Bank;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::store::KvStore;
use crate::types::keys::PARAMS_KEY;
use crate::types::Params;
use tracing::info;

impl<B: Bank> Keeper<B> {
    pub fn get_params(&self, store: &dyn KvStore) -> Result<Params> {
        read(store, PARAMS_KEY)?.ok_or_else(|| Error::Corrupted("params not initialized".into()))
    }

    /// Replace the module parameters. The only writer; rejects invalid values.
    pub fn set_params(&self, ctx: &mut Context<'_>, params: &Params) -> Result<()> {
        params.validate()?;
        write(ctx.store_mut(), PARAMS_KEY, params)?;
        info!(
            "params set: ticket price {}, draw duration {}s",
            params.ticket.price,
            params.draw.duration.as_secs()
        );
        Ok(())
    }
}

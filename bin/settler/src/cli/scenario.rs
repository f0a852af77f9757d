// This file is part of Settler.
//
// Settler is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Settler is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Settler.
// If not, see https://www.gnu.org/licenses/.


use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::bail;
use clap::Args;
use parking_lot::RwLock;
use settler_entry_point::{BlockEnv, EntryPoint, SimpleWallet, SimpleWalletFactory};
use settler_signer::{deterministic_signer, sign_user_op};
use settler_sim::{EntryPointTracer, Simulator, SimulatorImpl};
use settler_types::{call_data_cost, UserOperation};
use settler_utils::{
    emit::receive_and_log_events_with_filter,
    log::{LogOnError, LogWithContext},
};

use super::settings::Settings;

/// CLI options for the scenario command
#[derive(Debug, Args)]
#[command(next_help_heading = "Scenario")]
pub struct ScenarioArgs {
    /// Counter the wallet owner's key is derived from
    #[arg(long = "scenario.owner", name = "scenario.owner", default_value = "1")]
    owner: u64,

    /// Salt the factory derives the wallet address from
    #[arg(long = "scenario.salt", name = "scenario.salt", default_value = "0")]
    salt: U256,

    /// Ether the wallet holds before its first operation
    #[arg(
        long = "scenario.wallet_balance",
        name = "scenario.wallet_balance",
        default_value = "2",
        value_parser = alloy_primitives::utils::parse_ether
    )]
    wallet_balance: U256,

    /// Ether the wallet transfers to the recipient
    #[arg(
        long = "scenario.amount",
        name = "scenario.amount",
        default_value = "1",
        value_parser = alloy_primitives::utils::parse_ether
    )]
    amount: U256,

    /// Recipient of the transfer
    #[arg(
        long = "scenario.recipient",
        name = "scenario.recipient",
        default_value = "0x2222222222222222222222222222222222222222"
    )]
    recipient: Address,

    /// Address the relayer collects fees at
    #[arg(
        long = "scenario.beneficiary",
        name = "scenario.beneficiary",
        default_value = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
    )]
    beneficiary: Address,

    /// Block base fee in wei
    #[arg(
        long = "scenario.base_fee",
        name = "scenario.base_fee",
        default_value = "1000000000"
    )]
    base_fee: U256,
}

const FACTORY: Address = Address::repeat_byte(0xfa);

/// Deploy a wallet through its first operation, screen and settle it, then show
/// that a replay and a signature for another chain are both rejected.
pub async fn run(args: ScenarioArgs, settings: Settings) -> anyhow::Result<()> {
    let mut entry_point = EntryPoint::new(settings.entry_point);
    entry_point.set_block(BlockEnv {
        number: 1,
        timestamp: 1,
        base_fee: args.base_fee,
    });
    let events = receive_and_log_events_with_filter(entry_point.subscribe(), |_| true);

    let owner = deterministic_signer(args.owner)?;
    let factory = SimpleWalletFactory::new(entry_point.address());
    let sender = factory.wallet_address(FACTORY, owner.address(), args.salt);
    entry_point.deploy_factory(FACTORY, factory);
    entry_point.fund(sender, args.wallet_balance);
    tracing::info!("Counterfactual wallet {sender} owned by {}", owner.address());

    let mut unsigned = UserOperation {
        sender,
        nonce: U256::ZERO,
        init_code: SimpleWalletFactory::init_code(FACTORY, owner.address(), args.salt).into(),
        call_data: SimpleWallet::transfer_call(args.recipient, args.amount).into(),
        call_gas: U256::from(200_000),
        verification_gas: U256::from(200_000),
        max_fee_per_gas: args.base_fee * U256::from(2),
        max_priority_fee_per_gas: args.base_fee,
        ..Default::default()
    };
    // relayer overhead: the base transaction cost plus the calldata the op occupies
    unsigned.pre_verification_gas = U256::from(21_000 + call_data_cost(&unsigned.pack()));
    let op = sign_user_op(
        &owner,
        unsigned.clone(),
        entry_point.address(),
        entry_point.chain_id(),
    )?;

    let entry_point = Arc::new(RwLock::new(entry_point));
    let simulator = SimulatorImpl::new(
        EntryPointTracer::new(Arc::clone(&entry_point)),
        settings.simulation,
    );
    let simulated = simulator
        .simulate_validation(op.clone())
        .await
        .log_context("simulating first operation")?;
    tracing::info!(
        "Simulated {}: pre-op gas {}, prefund {}, {} traced steps",
        simulated.request_id,
        simulated.pre_op_gas,
        simulated.prefund,
        simulated.trace_len
    );

    let outcome = entry_point.write().handle_op(&op, args.beneficiary)?;
    tracing::info!(
        "Settled {}: success {}, gas used {}, fee {}",
        outcome.request_id,
        outcome.success,
        outcome.actual_gas_used,
        outcome.actual_gas_cost
    );
    {
        let entry_point = entry_point.read();
        tracing::info!(
            "Recipient balance {}, beneficiary balance {}, wallet balance {}",
            entry_point.balance(args.recipient),
            entry_point.balance(args.beneficiary),
            entry_point.balance(sender)
        );
    }

    if entry_point
        .write()
        .handle_op(&op, args.beneficiary)
        .log_on_error_level(tracing::Level::INFO, "replay rejected")
        .is_ok()
    {
        bail!("replayed operation was accepted");
    }

    let other_chain = entry_point.read().chain_id() + 1;
    let foreign = sign_user_op(
        &owner,
        UserOperation {
            nonce: U256::from(1),
            init_code: Default::default(),
            ..unsigned
        },
        entry_point.read().address(),
        other_chain,
    )?;
    if let Ok(result) = simulator.simulate_validation(foreign).await {
        bail!("operation signed for chain {other_chain} passed simulation: {result:?}");
    }
    tracing::info!("Operation signed for chain {other_chain} rejected");

    // the event stream closes once the coordinator is dropped
    drop(simulator);
    drop(entry_point);
    events.await.log_on_error("event logger")?;
    Ok(())
}

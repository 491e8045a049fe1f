use std::sync::Arc;

use ethers::types::{Address, BlockNumber, U256};
use eyre::{eyre, Result, WrapErr};
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use tx_sequencer::units::parse_eth;
use tx_sequencer::{
    ChainReader, ChainRpc, CounterContract, FeeSpec, HttpChainRpc, LocalSigner, SequencerMetrics,
    TransactionSequencer, TransferRequest, TxSigner,
};

use crate::cli::{Cli, Commands};
use crate::report::Reporter;

const ONE_GWEI: u64 = 1_000_000_000;

pub async fn run(cli: &Cli, cancel: &CancellationToken) -> Result<()> {
    let reporter = Reporter::new(cli.json);
    let conf = cli.chain_conf();
    let provider: Arc<dyn ChainRpc> = Arc::new(HttpChainRpc::new(&conf));

    match &cli.command {
        Commands::Block { number } => {
            let reader = ChainReader::new(&conf, provider, cli.rpc_timeout);
            show_blocks(&reader, *number, &reporter, cancel).await
        }
        Commands::Balance { address } => {
            let reader = ChainReader::new(&conf, provider, cli.rpc_timeout);
            let address = match address {
                Some(address) => *address,
                None => signer(cli)?.address(),
            };
            let balance = reader.balance(&address, cancel).await?;
            let pending_nonce = reader.pending_nonce(&address, cancel).await?;
            reporter.balance(&address, balance, pending_nonce);
            Ok(())
        }
        Commands::Transfer {
            to,
            amount_eth,
            gas_limit,
            eip1559,
            no_wait,
        } => {
            let sequencer = sequencer(cli, provider)?;
            let value = parse_eth(amount_eth).wrap_err("invalid --amount-eth")?;
            let request = transfer_request(&sequencer, *to, value, *gas_limit, *eip1559, cancel).await?;
            transfer(&sequencer, request, !*no_wait, &reporter, cancel).await?;
            print_metrics(cli, &sequencer, &reporter)
        }
        Commands::Batch {
            to,
            amount_eth,
            count,
            gas_limit,
            eip1559,
        } => {
            let sequencer = sequencer(cli, provider)?;
            let value = parse_eth(amount_eth).wrap_err("invalid --amount-eth")?;
            let request = transfer_request(&sequencer, *to, value, *gas_limit, *eip1559, cancel).await?;
            batch(&sequencer, request, *count, &reporter, cancel).await?;
            print_metrics(cli, &sequencer, &reporter)
        }
        Commands::Counter {
            contract,
            gas_limit,
            eip1559,
        } => {
            let sequencer = sequencer(cli, provider)?;
            let counter = CounterContract::new(*contract)?;
            let fee = fee(&sequencer, *eip1559, cancel).await?;
            increment_counter(&sequencer, &counter, U256::from(*gas_limit), fee, &reporter, cancel)
                .await?;
            print_metrics(cli, &sequencer, &reporter)
        }
    }
}

fn signer(cli: &Cli) -> Result<LocalSigner> {
    let key = cli
        .private_key
        .as_deref()
        .ok_or_else(|| eyre!("a private key is required, set --private-key or PRIVATE_KEY"))?;
    Ok(LocalSigner::from_private_key(key)?)
}

fn sequencer(cli: &Cli, provider: Arc<dyn ChainRpc>) -> Result<TransactionSequencer> {
    let signer = signer(cli)?;
    info!(address = ?signer.address(), "Loaded signer");
    let metrics = SequencerMetrics::new(Registry::new())?;
    Ok(TransactionSequencer::new(
        &cli.chain_conf(),
        cli.settings(),
        provider,
        Arc::new(signer),
        metrics,
    ))
}

fn print_metrics(cli: &Cli, sequencer: &TransactionSequencer, reporter: &Reporter) -> Result<()> {
    if cli.print_metrics {
        let text = String::from_utf8(sequencer.metrics().gather()?)?;
        reporter.metrics(&text);
    }
    Ok(())
}

async fn show_blocks(
    reader: &ChainReader,
    number: Option<u64>,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> Result<()> {
    let latest = reader
        .block(BlockNumber::Latest, cancel)
        .await?
        .ok_or_else(|| eyre!("node returned no latest block"))?;
    reporter.block("latest", &latest);

    if let Some(number) = number {
        match reader.block(BlockNumber::Number(number.into()), cancel).await? {
            Some(block) => reporter.block("requested", &block),
            None => reporter.missing_block(number),
        }
    }
    Ok(())
}

/// Legacy pricing uses the node's suggestion as is. EIP-1559 pricing allows
/// twice the suggestion, tipping at most one gwei.
async fn fee(
    sequencer: &TransactionSequencer,
    eip1559: bool,
    cancel: &CancellationToken,
) -> Result<FeeSpec> {
    let gas_price = sequencer.reader().gas_price(cancel).await?;
    if !eip1559 {
        return Ok(FeeSpec::Legacy { gas_price });
    }
    Ok(FeeSpec::Eip1559 {
        max_fee_per_gas: gas_price.saturating_mul(U256::from(2u64)),
        max_priority_fee_per_gas: gas_price.min(U256::from(ONE_GWEI)),
    })
}

async fn transfer_request(
    sequencer: &TransactionSequencer,
    to: Address,
    value: U256,
    gas_limit: u64,
    eip1559: bool,
    cancel: &CancellationToken,
) -> Result<TransferRequest> {
    let fee = fee(sequencer, eip1559, cancel).await?;
    Ok(TransferRequest::new(to, value, U256::from(gas_limit), fee))
}

#[instrument(skip_all, fields(to = ?request.to))]
async fn transfer(
    sequencer: &TransactionSequencer,
    request: TransferRequest,
    wait: bool,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> Result<()> {
    let balance = sequencer.preflight(&request, cancel).await?;
    reporter.plan(
        request.value,
        request.gas_limit,
        request.fee.max_price_per_gas(),
        request.max_cost(),
        balance,
    );

    let mut tx = sequencer.send(request, cancel).await?;
    reporter.submitted(&tx);
    if !wait {
        return Ok(());
    }

    match sequencer.await_confirmation(&mut tx, cancel).await {
        Ok(confirmation) => {
            reporter.confirmed(&tx, &confirmation);
            Ok(())
        }
        Err(err) => {
            reporter.failed(&tx, &err);
            Err(err.into())
        }
    }
}

#[instrument(skip_all, fields(count = count))]
async fn batch(
    sequencer: &TransactionSequencer,
    request: TransferRequest,
    count: usize,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut total = request.clone();
    total.value = request.value.saturating_mul(U256::from(count));
    total.gas_limit = request.gas_limit.saturating_mul(U256::from(count));
    let balance = sequencer.preflight(&total, cancel).await?;
    reporter.plan(
        total.value,
        total.gas_limit,
        total.fee.max_price_per_gas(),
        total.max_cost(),
        balance,
    );

    let submission = sequencer
        .send_batch(vec![request; count], cancel)
        .await?;
    reporter.batch(&submission);

    let mut transactions = submission.transactions;
    let (submitted, unsubmitted) = transactions.split_at_mut(submission.submitted);
    for tx in submitted.iter() {
        reporter.submitted(tx);
    }

    let mut failures = 0;
    let outcomes = sequencer.await_batch(submitted, cancel).await;
    for (tx, outcome) in submitted.iter().zip(outcomes) {
        match outcome {
            Ok(confirmation) => reporter.confirmed(tx, &confirmation),
            Err(err) => {
                failures += 1;
                reporter.failed(tx, &err);
            }
        }
    }

    if let Some(err) = submission.error {
        for tx in unsubmitted.iter() {
            reporter.failed(tx, &err);
        }
        return Err(err.into());
    }
    if failures > 0 {
        return Err(eyre!("{failures} of {count} transactions did not confirm"));
    }
    Ok(())
}

#[instrument(skip_all, fields(contract = ?counter.address()))]
async fn increment_counter(
    sequencer: &TransactionSequencer,
    counter: &CounterContract,
    gas_limit: U256,
    fee: FeeSpec,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> Result<()> {
    let before = counter.get_count(sequencer.reader(), None, cancel).await?;

    let request = counter.increment_request(gas_limit, fee)?;
    sequencer.preflight(&request, cancel).await?;
    let mut tx = sequencer.send(request, cancel).await?;
    reporter.submitted(&tx);

    let confirmation = match sequencer.await_confirmation(&mut tx, cancel).await {
        Ok(confirmation) => confirmation,
        Err(err) => {
            reporter.failed(&tx, &err);
            return Err(err.into());
        }
    };
    reporter.confirmed(&tx, &confirmation);

    let after = counter
        .get_count(sequencer.reader(), Some(confirmation.block_number), cancel)
        .await?;
    reporter.counter(before, after, confirmation.block_number);
    Ok(())
}

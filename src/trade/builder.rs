//! Assemble, refresh blockhash, sign

use super::assembler::TransactionAssembler;
use super::image::ImageResolver;
use super::pinning::MetadataPinner;
use super::request::{Action, TokenLaunch, TokenMetadata, TradeRequest};
use crate::chain::ChainRpc;
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use solana_sdk::hash::Hash;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;

/// A transaction signed against a fresh blockhash.
///
/// Not `Clone`: broadcasting consumes it.
pub struct SignedTransaction {
    transaction: VersionedTransaction,
    blockhash: Hash,
    last_valid_block_height: u64,
    mint: Option<Pubkey>,
}

impl SignedTransaction {
    /// Fee payer signature, which is the transaction id
    pub fn signature(&self) -> Signature {
        self.transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_default()
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn last_valid_block_height(&self) -> u64 {
        self.last_valid_block_height
    }

    /// Mint created by a launch
    pub fn mint(&self) -> Option<Pubkey> {
        self.mint
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }
}

impl std::fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("signature", &self.signature())
            .field("blockhash", &self.blockhash)
            .field("last_valid_block_height", &self.last_valid_block_height)
            .field("mint", &self.mint)
            .finish()
    }
}

/// Builds signed transactions for trades, launches and transfers
pub struct TransactionBuilder {
    assembler: Arc<dyn TransactionAssembler>,
    pinner: Arc<dyn MetadataPinner>,
    images: ImageResolver,
    rpc: Arc<dyn ChainRpc>,
}

impl TransactionBuilder {
    pub fn new(
        assembler: Arc<dyn TransactionAssembler>,
        pinner: Arc<dyn MetadataPinner>,
        images: ImageResolver,
        rpc: Arc<dyn ChainRpc>,
    ) -> Self {
        Self {
            assembler,
            pinner,
            images,
            rpc,
        }
    }

    /// Buy or sell an existing token
    pub async fn build_trade(
        &self,
        wallet: &SecureWallet,
        request: TradeRequest,
    ) -> Result<SignedTransaction> {
        if request.action == Action::Create {
            return Err(Error::validation(
                "action",
                "token creation goes through build_launch",
            ));
        }
        check_owner(wallet, &request)?;
        request.validate()?;

        let unsigned = self.assembler.assemble(&request).await?;
        self.sign(unsigned, &[wallet.signer()], None).await
    }

    /// Create a token, optionally with an initial buy of `request.amount` SOL.
    ///
    /// The mint keypair is generated here and co-signs the transaction.
    pub async fn build_launch(
        &self,
        wallet: &SecureWallet,
        launch: &TokenLaunch,
        mut request: TradeRequest,
    ) -> Result<SignedTransaction> {
        let mint = Keypair::new();
        request.action = Action::Create;
        request.mint = mint.pubkey().to_string();
        request.denominated_in_sol = true;

        check_owner(wallet, &request)?;
        request.validate()?;
        launch.validate()?;

        let image = self.images.resolve(&launch.image).await?;
        let uri = self.pinner.pin(launch, image).await?;
        request.token_metadata = Some(TokenMetadata {
            name: launch.name.trim().to_string(),
            symbol: launch.symbol.trim().to_string(),
            uri,
        });

        tracing::info!(
            mint = %mint.pubkey(),
            symbol = %launch.symbol,
            initial_buy_sol = request.amount,
            "Assembling token launch"
        );
        let unsigned = self.assembler.assemble(&request).await?;
        self.sign(unsigned, &[wallet.signer(), &mint], Some(mint.pubkey()))
            .await
    }

    /// Plain SOL transfer, built locally
    pub async fn build_transfer(
        &self,
        wallet: &SecureWallet,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<SignedTransaction> {
        if lamports == 0 {
            return Err(Error::validation("amount", "must be greater than zero"));
        }
        let instruction = system_instruction::transfer(&wallet.pubkey(), to, lamports);
        let message = Message::new(&[instruction], Some(&wallet.pubkey()));
        let unsigned = VersionedTransaction {
            signatures: vec![Signature::default(); usize::from(message.header.num_required_signatures)],
            message: VersionedMessage::Legacy(message),
        };
        self.sign(unsigned, &[wallet.signer()], None).await
    }

    /// Attach the latest blockhash and sign. The blockhash is fetched here so
    /// nothing else sits between it and broadcast.
    async fn sign(
        &self,
        unsigned: VersionedTransaction,
        signers: &[&Keypair],
        mint: Option<Pubkey>,
    ) -> Result<SignedTransaction> {
        let (blockhash, last_valid_block_height) = self.rpc.latest_blockhash().await?;

        let mut message = unsigned.message;
        message.set_recent_blockhash(blockhash);

        let transaction = VersionedTransaction::try_new(message, signers)
            .map_err(|e| Error::Wallet(format!("Signing failed: {}", e)))?;

        let signed = SignedTransaction {
            transaction,
            blockhash,
            last_valid_block_height,
            mint,
        };
        tracing::debug!(
            signature = %signed.signature(),
            blockhash = %blockhash,
            last_valid_block_height,
            "Transaction signed"
        );
        Ok(signed)
    }
}

fn check_owner(wallet: &SecureWallet, request: &TradeRequest) -> Result<()> {
    if request.public_key != wallet.address_string() {
        return Err(Error::validation(
            "publicKey",
            "does not match the active wallet",
        ));
    }
    Ok(())
}

pub use crate::{
    generators::{generate_address, generate_hash, generate_height},
    ledger::{
        generate_dst_transaction, generate_poly_transaction, generate_src_transaction,
        generate_transfer, generate_wrapper, TransferFixture,
    },
    token::{chain_fee, token_basic},
};

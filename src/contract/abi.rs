use alloy::sol;

sol! {
    /// Sealed-bid auction house. Only the surface the indexer reads is declared.
    contract AuctionHouse {
        event NewWinner(
            address indexed winner,
            uint256 auctionId,
            uint256 winningBid,
            string text,
            string imageCid,
            string voiceCid
        );

        event PostTipped(uint256 indexed auctionId, address indexed tipper, uint256 amount);

        function currentAuctionId() external view returns (uint256);

        function getAuctionResult(uint256 auctionId)
            external
            view
            returns (bool settled, address winner, uint256 winningBid, uint256 secondHighestBid);
    }
}
